//! Inventory tracking.
//!
//! Rebuilds the aggregate item map on client pickup/drop events, diffing
//! against the previous map to produce a bounded change feed. Queries
//! over the aggregate (categorization, resource checks, craft
//! feasibility) serve the strategy layer and the tools.

use chrono::{DateTime, Utc};
use clawcraft_core::bot::{BotClient, ClientEvent, ItemStack};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Total inventory slots.
const TOTAL_SLOTS: usize = 36;

/// Bound on the retained change feed.
const CHANGE_RING_CAPACITY: usize = 100;

const TOOL_KEYWORDS: &[&str] = &["pickaxe", "axe", "shovel", "hoe"];
const WEAPON_KEYWORDS: &[&str] = &["sword", "bow", "crossbow", "trident"];
const ARMOR_KEYWORDS: &[&str] = &["helmet", "chestplate", "leggings", "boots", "shield"];

const FOOD_ITEMS: &[&str] = &[
    "bread",
    "apple",
    "golden_apple",
    "carrot",
    "baked_potato",
    "cooked_beef",
    "cooked_porkchop",
    "cooked_chicken",
    "cooked_mutton",
    "cooked_cod",
    "cooked_salmon",
    "melon_slice",
    "cookie",
];

const ORE_ITEMS: &[&str] = &[
    "coal",
    "raw_iron",
    "iron_ingot",
    "raw_gold",
    "gold_ingot",
    "diamond",
    "emerald",
    "redstone",
    "lapis_lazuli",
    "ancient_debris",
    "netherite_scrap",
];

const BLOCK_HINTS: &[&str] = &["_block", "stone", "dirt", "planks", "log"];

/// Direction of an inventory change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One entry in the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryChange {
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub item: String,
    pub count_before: u32,
    pub count_after: u32,
    pub delta: i64,
}

/// Items grouped into the six fixed categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizedItems {
    pub tools: Vec<String>,
    pub weapons: Vec<String>,
    pub armor: Vec<String>,
    pub food: Vec<String>,
    pub blocks: Vec<String>,
    pub ores: Vec<String>,
    pub other: Vec<String>,
}

/// Aggregate inventory view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    /// Total item count across all stacks.
    pub total_items: u32,
    /// Distinct stacks in use.
    pub used_slots: usize,
    pub free_slots: usize,
    pub items: Vec<ItemStack>,
    pub categories: CategorizedItems,
}

/// The fixed boolean bundle the strategy layer consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCheck {
    pub has_wooden_pickaxe: bool,
    pub has_stone_pickaxe: bool,
    pub has_iron_pickaxe: bool,
    pub has_diamond_pickaxe: bool,
    pub has_sword: bool,
    pub has_food: bool,
    pub has_torch: bool,
    pub has_crafting_table: bool,
    pub wood_count: u32,
    pub stone_count: u32,
    pub iron_count: u32,
    pub diamond_count: u32,
    pub food_count: u32,
}

struct TrackerState {
    counts: HashMap<String, u32>,
    changes: VecDeque<InventoryChange>,
}

struct ListenerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Diff-based inventory tracker.
pub struct InventoryTracker {
    client: Arc<dyn BotClient>,
    state: RwLock<TrackerState>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl InventoryTracker {
    pub fn new(client: Arc<dyn BotClient>) -> Self {
        let tracker = Self {
            client,
            state: RwLock::new(TrackerState {
                counts: HashMap::new(),
                changes: VecDeque::new(),
            }),
            listener: Mutex::new(None),
        };
        tracker.update_snapshot();
        tracker
    }

    fn aggregate(&self) -> HashMap<String, u32> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for stack in self.client.inventory_items() {
            *counts.entry(stack.name).or_insert(0) += stack.count;
        }
        counts
    }

    /// Rebuild the aggregate map without emitting changes.
    pub fn update_snapshot(&self) {
        let counts = self.aggregate();
        self.state.write().unwrap().counts = counts;
    }

    /// Rebuild the aggregate map, appending one change per differing item.
    pub fn refresh(&self) {
        let new_counts = self.aggregate();
        let now = Utc::now();
        let mut state = self.state.write().unwrap();

        let mut items: Vec<&String> = new_counts.keys().chain(state.counts.keys()).collect();
        items.sort();
        items.dedup();

        let mut changes = Vec::new();
        for item in items {
            let before = state.counts.get(item).copied().unwrap_or(0);
            let after = new_counts.get(item).copied().unwrap_or(0);
            if before == after {
                continue;
            }
            let delta = after as i64 - before as i64;
            changes.push(InventoryChange {
                timestamp: now,
                kind: if delta > 0 {
                    ChangeKind::Added
                } else {
                    ChangeKind::Removed
                },
                item: item.clone(),
                count_before: before,
                count_after: after,
                delta,
            });
        }

        for change in changes {
            debug!(item = %change.item, delta = change.delta, "Inventory change");
            if state.changes.len() >= CHANGE_RING_CAPACITY {
                state.changes.pop_front();
            }
            state.changes.push_back(change);
        }
        state.counts = new_counts;
    }

    /// Subscribe to client pickup/drop events and refresh on each.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.listener.lock().unwrap();
        if guard.is_some() {
            warn!("Inventory listener already running, ignoring start");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let tracker = Arc::clone(self);
        let mut events = self.client.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(ClientEvent::ItemAdded { .. }) | Ok(ClientEvent::ItemDropped { .. }) => {
                                tracker.refresh();
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Inventory events lagged, resyncing");
                                tracker.refresh();
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                        }
                    }
                    _ = stop_rx.changed() => return,
                }
            }
        });

        *guard = Some(ListenerHandle { stop: stop_tx, task });
    }

    /// Stop the event listener. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(handle) = self.listener.lock().unwrap().take() {
            let _ = handle.stop.send(true);
            handle.task.abort();
        }
    }

    /// The retained change feed, oldest first.
    pub fn changes(&self) -> Vec<InventoryChange> {
        self.state.read().unwrap().changes.iter().cloned().collect()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// A copy of the aggregate item → count map.
    pub fn counts(&self) -> HashMap<String, u32> {
        self.state.read().unwrap().counts.clone()
    }

    pub fn item_count(&self, name: &str) -> u32 {
        self.state.read().unwrap().counts.get(name).copied().unwrap_or(0)
    }

    pub fn has_item(&self, name: &str, min: u32) -> bool {
        self.item_count(name) >= min
    }

    pub fn find_item(&self, name: &str) -> Option<ItemStack> {
        self.client.inventory_items().into_iter().find(|s| s.name == name)
    }

    /// Whether used slots exceed a threshold ratio in [0, 1].
    pub fn is_nearly_full(&self, threshold: f64) -> bool {
        let used = self.client.inventory_items().len();
        used as f64 / TOTAL_SLOTS as f64 >= threshold
    }

    /// Categorize one item name. Tables are checked in a fixed order, so
    /// an item lands in exactly one category.
    pub fn categorize(name: &str) -> &'static str {
        if TOOL_KEYWORDS.iter().any(|k| name.contains(k)) {
            "tools"
        } else if WEAPON_KEYWORDS.iter().any(|k| name.contains(k)) {
            "weapons"
        } else if ARMOR_KEYWORDS.iter().any(|k| name.contains(k)) {
            "armor"
        } else if FOOD_ITEMS.contains(&name) {
            "food"
        } else if ORE_ITEMS.contains(&name) {
            "ores"
        } else if BLOCK_HINTS.iter().any(|k| name.contains(k)) {
            "blocks"
        } else {
            "other"
        }
    }

    pub fn summary(&self) -> InventorySummary {
        let items = self.client.inventory_items();
        let used_slots = items.len();
        let total_items = items.iter().map(|s| s.count).sum();

        let mut names: Vec<&str> = items.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names.dedup();

        let mut categories = CategorizedItems::default();
        for name in names {
            let bucket = match Self::categorize(name) {
                "tools" => &mut categories.tools,
                "weapons" => &mut categories.weapons,
                "armor" => &mut categories.armor,
                "food" => &mut categories.food,
                "ores" => &mut categories.ores,
                "blocks" => &mut categories.blocks,
                _ => &mut categories.other,
            };
            bucket.push(name.to_string());
        }

        InventorySummary {
            total_items,
            used_slots,
            free_slots: TOTAL_SLOTS.saturating_sub(used_slots),
            items,
            categories,
        }
    }

    /// The fixed boolean bundle used by the strategic layer.
    pub fn check_resources(&self) -> ResourceCheck {
        let state = self.state.read().unwrap();
        let count = |name: &str| state.counts.get(name).copied().unwrap_or(0);

        let wood_count: u32 = state
            .counts
            .iter()
            .filter(|(name, _)| name.ends_with("_log") || name.ends_with("_planks"))
            .map(|(_, c)| *c)
            .sum();
        let food_count: u32 = FOOD_ITEMS.iter().map(|f| count(f)).sum();

        ResourceCheck {
            has_wooden_pickaxe: count("wooden_pickaxe") > 0,
            has_stone_pickaxe: count("stone_pickaxe") > 0,
            has_iron_pickaxe: count("iron_pickaxe") > 0,
            has_diamond_pickaxe: count("diamond_pickaxe") > 0,
            has_sword: state.counts.keys().any(|n| n.ends_with("_sword")),
            has_food: food_count > 0,
            has_torch: count("torch") > 0,
            has_crafting_table: count("crafting_table") > 0,
            wood_count,
            stone_count: count("cobblestone") + count("stone"),
            iron_count: count("iron_ingot") + count("raw_iron"),
            diamond_count: count("diamond"),
            food_count,
        }
    }

    /// Whether any known recipe for `name` is currently craftable.
    pub fn can_craft(&self, name: &str) -> bool {
        self.client
            .recipes_for(name)
            .iter()
            .any(|r| self.client.can_craft(r, 1))
    }

    /// Ingredients still missing for the first known recipe of `name`.
    pub fn missing_materials(&self, name: &str) -> Vec<(String, u32)> {
        let recipes = self.client.recipes_for(name);
        let Some(recipe) = recipes.first() else {
            return Vec::new();
        };
        let state = self.state.read().unwrap();
        recipe
            .ingredients
            .iter()
            .filter_map(|(ingredient, needed)| {
                let have = state.counts.get(ingredient).copied().unwrap_or(0);
                (have < *needed).then(|| (ingredient.clone(), needed - have))
            })
            .collect()
    }
}
