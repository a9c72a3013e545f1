//! A deterministic in-memory game client.
//!
//! `SimClient` models just enough world to exercise the whole control
//! plane: a block list, an entity list, an inventory with events, a
//! recipe book, and teleport-style navigation. All mutation goes through
//! a single internal lock; reads clone out, so no lock is ever held
//! across an await point.

use async_trait::async_trait;
use clawcraft_core::bot::{
    BlockRef, BotClient, Capability, ClientEvent, EntityRef, ItemStack, Recipe,
};
use clawcraft_core::error::ClientError;
use clawcraft_core::snapshot::Position;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

struct SimWorld {
    spawned: bool,
    position: Position,
    health: f32,
    food: f32,
    dimension: String,
    time_of_day: i64,
    raining: bool,
    inventory: Vec<ItemStack>,
    held_item: Option<String>,
    blocks: Vec<BlockRef>,
    entities: Vec<EntityRef>,
    recipes: Vec<Recipe>,
    pending_drops: Vec<String>,
    capabilities: HashSet<Capability>,
}

/// A deterministic in-memory implementation of the `BotClient` port.
pub struct SimClient {
    world: Mutex<SimWorld>,
    events: broadcast::Sender<ClientEvent>,
}

impl Default for SimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClient {
    /// A spawned bot with full vitals, all capabilities, and an empty world.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            world: Mutex::new(SimWorld {
                spawned: true,
                position: Position::new(0.0, 64.0, 0.0),
                health: 20.0,
                food: 20.0,
                dimension: "overworld".into(),
                time_of_day: 1000,
                raining: false,
                inventory: Vec::new(),
                held_item: None,
                blocks: Vec::new(),
                entities: Vec::new(),
                recipes: Vec::new(),
                pending_drops: Vec::new(),
                capabilities: HashSet::from([
                    Capability::Pathfinder,
                    Capability::AutoEat,
                    Capability::Pvp,
                    Capability::CollectBlock,
                    Capability::ArmorManager,
                    Capability::BestTool,
                ]),
            }),
            events,
        }
    }

    /// A small seeded world for the offline runner: trees, stone, some
    /// ore, a zombie at a distance, and the basic wooden recipes.
    pub fn demo_world() -> Self {
        let client = Self::new();
        {
            let mut w = client.world.lock().unwrap();
            for i in 0..4 {
                w.blocks.push(BlockRef {
                    name: "oak_log".into(),
                    position: Position::new(6.0 + i as f64, 64.0, 2.0),
                });
            }
            for i in 0..8 {
                w.blocks.push(BlockRef {
                    name: "stone".into(),
                    position: Position::new(-4.0, 60.0, 3.0 + i as f64),
                });
            }
            w.blocks.push(BlockRef {
                name: "iron_ore".into(),
                position: Position::new(-6.0, 58.0, 10.0),
            });
            w.blocks.push(BlockRef {
                name: "coal_ore".into(),
                position: Position::new(-5.0, 59.0, 8.0),
            });
            w.entities.push(EntityRef {
                name: "zombie".into(),
                kind: "mob".into(),
                position: Position::new(20.0, 64.0, 20.0),
                hostile: true,
                health: Some(20.0),
            });
            w.recipes = vec![
                Recipe {
                    result: "oak_planks".into(),
                    yield_count: 4,
                    ingredients: vec![("oak_log".into(), 1)],
                    requires_table: false,
                },
                Recipe {
                    result: "stick".into(),
                    yield_count: 4,
                    ingredients: vec![("oak_planks".into(), 2)],
                    requires_table: false,
                },
                Recipe {
                    result: "crafting_table".into(),
                    yield_count: 1,
                    ingredients: vec![("oak_planks".into(), 4)],
                    requires_table: false,
                },
                Recipe {
                    result: "wooden_pickaxe".into(),
                    yield_count: 1,
                    ingredients: vec![("oak_planks".into(), 3), ("stick".into(), 2)],
                    requires_table: true,
                },
            ];
        }
        client
    }

    // ── Test/scenario world shaping ─────────────────────────────────────

    pub fn set_spawned(&self, spawned: bool) {
        self.world.lock().unwrap().spawned = spawned;
    }

    pub fn set_position(&self, pos: Position) {
        self.world.lock().unwrap().position = pos;
    }

    pub fn set_vitals(&self, health: f32, food: f32) {
        let mut w = self.world.lock().unwrap();
        w.health = health;
        w.food = food;
    }

    pub fn set_dimension(&self, dimension: &str) {
        self.world.lock().unwrap().dimension = dimension.to_string();
    }

    pub fn set_weather(&self, raining: bool) {
        self.world.lock().unwrap().raining = raining;
    }

    pub fn set_time_of_day(&self, time: i64) {
        self.world.lock().unwrap().time_of_day = time;
    }

    pub fn place_block(&self, name: &str, pos: Position) {
        self.world.lock().unwrap().blocks.push(BlockRef {
            name: name.into(),
            position: pos,
        });
    }

    /// Remove every block so cliff scans see open air below.
    pub fn clear_blocks(&self) {
        self.world.lock().unwrap().blocks.clear();
    }

    pub fn spawn_entity(&self, entity: EntityRef) {
        self.world.lock().unwrap().entities.push(entity);
    }

    pub fn add_recipe(&self, recipe: Recipe) {
        self.world.lock().unwrap().recipes.push(recipe);
    }

    pub fn drop_capability(&self, cap: Capability) {
        self.world.lock().unwrap().capabilities.remove(&cap);
    }

    /// Add items to the inventory, emitting the pickup event.
    pub fn give(&self, item: &str, count: u32) {
        {
            let mut w = self.world.lock().unwrap();
            add_to_inventory(&mut w.inventory, item, count);
        }
        let _ = self.events.send(ClientEvent::ItemAdded {
            item: item.into(),
            count,
        });
    }

    /// Remove items from the inventory, emitting the drop event.
    pub fn take(&self, item: &str, count: u32) {
        let removed = {
            let mut w = self.world.lock().unwrap();
            remove_from_inventory(&mut w.inventory, item, count)
        };
        if removed > 0 {
            let _ = self.events.send(ClientEvent::ItemDropped {
                item: item.into(),
                count: removed,
            });
        }
    }

    /// Simulate incoming damage.
    pub fn hurt(&self, amount: f32) {
        let health = {
            let mut w = self.world.lock().unwrap();
            w.health = (w.health - amount).max(0.0);
            w.health
        };
        let _ = self.events.send(ClientEvent::Damaged { health });
        if health <= 0.0 {
            let _ = self.events.send(ClientEvent::Died);
        }
    }
}

fn add_to_inventory(inventory: &mut Vec<ItemStack>, item: &str, count: u32) {
    if let Some(stack) = inventory.iter_mut().find(|s| s.name == item) {
        stack.count += count;
    } else {
        let slot = inventory.len() as u32;
        inventory.push(ItemStack {
            name: item.into(),
            count,
            slot: Some(slot),
        });
    }
}

fn remove_from_inventory(inventory: &mut Vec<ItemStack>, item: &str, count: u32) -> u32 {
    let Some(idx) = inventory.iter().position(|s| s.name == item) else {
        return 0;
    };
    let removed = inventory[idx].count.min(count);
    inventory[idx].count -= removed;
    if inventory[idx].count == 0 {
        inventory.remove(idx);
    }
    removed
}

#[async_trait]
impl BotClient for SimClient {
    fn position(&self) -> Option<Position> {
        let w = self.world.lock().unwrap();
        w.spawned.then_some(w.position)
    }

    fn health(&self) -> f32 {
        self.world.lock().unwrap().health
    }

    fn food(&self) -> f32 {
        self.world.lock().unwrap().food
    }

    fn dimension(&self) -> String {
        self.world.lock().unwrap().dimension.clone()
    }

    fn time_of_day(&self) -> i64 {
        self.world.lock().unwrap().time_of_day
    }

    fn is_raining(&self) -> bool {
        self.world.lock().unwrap().raining
    }

    fn inventory_items(&self) -> Vec<ItemStack> {
        self.world.lock().unwrap().inventory.clone()
    }

    fn find_blocks(&self, matching: &[String], max_distance: f64, count: usize) -> Vec<BlockRef> {
        let w = self.world.lock().unwrap();
        let origin = w.position;
        let mut found: Vec<BlockRef> = w
            .blocks
            .iter()
            .filter(|b| matching.iter().any(|m| *m == b.name))
            .filter(|b| b.position.distance_to(&origin) <= max_distance)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.position
                .distance_to(&origin)
                .total_cmp(&b.position.distance_to(&origin))
        });
        found.truncate(count);
        found
    }

    fn block_at(&self, pos: Position) -> Option<BlockRef> {
        let w = self.world.lock().unwrap();
        w.blocks
            .iter()
            .find(|b| b.position.distance_to(&pos) < 0.5)
            .cloned()
    }

    fn nearby_entities(&self) -> Vec<EntityRef> {
        self.world.lock().unwrap().entities.clone()
    }

    fn recipes_for(&self, item: &str) -> Vec<Recipe> {
        let w = self.world.lock().unwrap();
        w.recipes.iter().filter(|r| r.result == item).cloned().collect()
    }

    fn can_craft(&self, recipe: &Recipe, count: u32) -> bool {
        let w = self.world.lock().unwrap();
        recipe.ingredients.iter().all(|(name, needed)| {
            let have: u32 = w
                .inventory
                .iter()
                .filter(|s| s.name == *name)
                .map(|s| s.count)
                .sum();
            have >= needed * count
        })
    }

    fn has_capability(&self, cap: Capability) -> bool {
        self.world.lock().unwrap().capabilities.contains(&cap)
    }

    fn best_tool_for(&self, block: &BlockRef) -> Option<String> {
        let w = self.world.lock().unwrap();
        if !w.capabilities.contains(&Capability::BestTool) {
            return None;
        }
        let preference: &[&str] = if block.name.contains("ore") || block.name.contains("stone") {
            &["diamond_pickaxe", "iron_pickaxe", "stone_pickaxe", "wooden_pickaxe"]
        } else if block.name.ends_with("_log") {
            &["diamond_axe", "iron_axe", "stone_axe", "wooden_axe"]
        } else {
            &[]
        };
        preference
            .iter()
            .find(|tool| w.inventory.iter().any(|s| s.name == **tool))
            .map(|t| t.to_string())
    }

    async fn equip(&self, item: &str, _destination: &str) -> Result<(), ClientError> {
        let mut w = self.world.lock().unwrap();
        if !w.inventory.iter().any(|s| s.name == item) {
            return Err(ClientError::Action(format!("{item} is not in inventory")));
        }
        w.held_item = Some(item.to_string());
        Ok(())
    }

    async fn consume(&self) -> Result<(), ClientError> {
        let item = {
            let mut w = self.world.lock().unwrap();
            let Some(item) = w.held_item.clone() else {
                return Err(ClientError::Action("nothing held to consume".into()));
            };
            if remove_from_inventory(&mut w.inventory, &item, 1) == 0 {
                return Err(ClientError::Action(format!("{item} is not in inventory")));
            }
            w.food = (w.food + 4.0).min(20.0);
            item
        };
        let _ = self.events.send(ClientEvent::ItemDropped { item, count: 1 });
        Ok(())
    }

    async fn dig(&self, block: &BlockRef) -> Result<(), ClientError> {
        let mut w = self.world.lock().unwrap();
        let Some(idx) = w
            .blocks
            .iter()
            .position(|b| b.name == block.name && b.position.distance_to(&block.position) < 0.5)
        else {
            return Err(ClientError::Action(format!(
                "no {} at {}",
                block.name, block.position
            )));
        };
        let removed = w.blocks.remove(idx);
        debug!(block = %removed.name, "Dug block");
        w.pending_drops.push(removed.name);
        Ok(())
    }

    async fn craft(
        &self,
        recipe: &Recipe,
        count: u32,
        table: Option<BlockRef>,
    ) -> Result<(), ClientError> {
        {
            let mut w = self.world.lock().unwrap();
            if recipe.requires_table && table.is_none() {
                return Err(ClientError::Action(format!(
                    "{} requires a crafting table",
                    recipe.result
                )));
            }
            for (name, needed) in &recipe.ingredients {
                let have: u32 = w
                    .inventory
                    .iter()
                    .filter(|s| s.name == *name)
                    .map(|s| s.count)
                    .sum();
                if have < needed * count {
                    return Err(ClientError::Action(format!(
                        "missing {name} for {}",
                        recipe.result
                    )));
                }
            }
            for (name, needed) in &recipe.ingredients {
                remove_from_inventory(&mut w.inventory, name, needed * count);
            }
            add_to_inventory(&mut w.inventory, &recipe.result, recipe.yield_count * count);
        }
        let _ = self.events.send(ClientEvent::ItemAdded {
            item: recipe.result.clone(),
            count: recipe.yield_count * count,
        });
        Ok(())
    }

    async fn goto(&self, pos: Position, range: f64) -> Result<(), ClientError> {
        let mut w = self.world.lock().unwrap();
        if !w.capabilities.contains(&Capability::Pathfinder) {
            // Degrade gracefully: stay put.
            return Ok(());
        }
        // Land just short of the target when a range is given.
        let current = w.position;
        let dist = current.distance_to(&pos);
        w.position = if range > 0.0 && dist > range {
            let t = (dist - range) / dist;
            Position::new(
                current.x + (pos.x - current.x) * t,
                current.y + (pos.y - current.y) * t,
                current.z + (pos.z - current.z) * t,
            )
        } else {
            pos
        };
        Ok(())
    }

    async fn collect_drops(&self, _near: Position) -> Result<u32, ClientError> {
        let drops = {
            let mut w = self.world.lock().unwrap();
            if !w.capabilities.contains(&Capability::CollectBlock) {
                return Ok(0);
            }
            let drops: Vec<String> = w.pending_drops.drain(..).collect();
            for item in &drops {
                add_to_inventory(&mut w.inventory, item, 1);
            }
            drops
        };
        for item in &drops {
            let _ = self.events.send(ClientEvent::ItemAdded {
                item: item.clone(),
                count: 1,
            });
        }
        Ok(drops.len() as u32)
    }

    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn give_and_take_emit_events() {
        let client = SimClient::new();
        let mut rx = client.subscribe();

        client.give("oak_log", 3);
        match rx.recv().await.unwrap() {
            ClientEvent::ItemAdded { item, count } => {
                assert_eq!(item, "oak_log");
                assert_eq!(count, 3);
            }
            other => panic!("expected ItemAdded, got {other:?}"),
        }

        client.take("oak_log", 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::ItemDropped { .. }
        ));
        assert_eq!(client.inventory_items()[0].count, 2);
    }

    #[tokio::test]
    async fn dig_then_collect() {
        let client = SimClient::new();
        let pos = Position::new(2.0, 64.0, 0.0);
        client.place_block("stone", pos);

        let block = BlockRef {
            name: "stone".into(),
            position: pos,
        };
        client.dig(&block).await.unwrap();
        assert!(client.block_at(pos).is_none());

        let collected = client.collect_drops(pos).await.unwrap();
        assert_eq!(collected, 1);
        assert_eq!(client.inventory_items()[0].name, "stone");
    }

    #[tokio::test]
    async fn collect_degrades_without_capability() {
        let client = SimClient::new();
        client.drop_capability(Capability::CollectBlock);
        let pos = Position::new(2.0, 64.0, 0.0);
        client.place_block("stone", pos);
        client
            .dig(&BlockRef {
                name: "stone".into(),
                position: pos,
            })
            .await
            .unwrap();
        assert_eq!(client.collect_drops(pos).await.unwrap(), 0);
        assert!(client.inventory_items().is_empty());
    }

    #[tokio::test]
    async fn craft_consumes_ingredients() {
        let client = SimClient::demo_world();
        client.give("oak_log", 2);

        let recipe = client.recipes_for("oak_planks").remove(0);
        assert!(client.can_craft(&recipe, 1));
        client.craft(&recipe, 1, None).await.unwrap();

        let items = client.inventory_items();
        let planks = items.iter().find(|s| s.name == "oak_planks").unwrap();
        assert_eq!(planks.count, 4);
        let logs = items.iter().find(|s| s.name == "oak_log").unwrap();
        assert_eq!(logs.count, 1);
    }

    #[tokio::test]
    async fn table_recipe_requires_table() {
        let client = SimClient::demo_world();
        client.give("oak_planks", 3);
        client.give("stick", 2);

        let recipe = client.recipes_for("wooden_pickaxe").remove(0);
        let err = client.craft(&recipe, 1, None).await.unwrap_err();
        assert!(err.to_string().contains("crafting table"));

        let table = BlockRef {
            name: "crafting_table".into(),
            position: Position::new(1.0, 64.0, 0.0),
        };
        client.craft(&recipe, 1, Some(table)).await.unwrap();
        assert!(client
            .inventory_items()
            .iter()
            .any(|s| s.name == "wooden_pickaxe"));
    }

    #[tokio::test]
    async fn goto_stops_at_range() {
        let client = SimClient::new();
        client.goto(Position::new(10.0, 64.0, 0.0), 2.0).await.unwrap();
        let pos = client.position().unwrap();
        assert!((pos.x - 8.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn consume_raises_food() {
        let client = SimClient::new();
        client.set_vitals(20.0, 10.0);
        client.give("bread", 2);
        client.equip("bread", "hand").await.unwrap();
        client.consume().await.unwrap();
        assert_eq!(client.food(), 14.0);
        assert_eq!(client.inventory_items()[0].count, 1);
    }

    #[test]
    fn unspawned_bot_has_no_position() {
        let client = SimClient::new();
        client.set_spawned(false);
        assert!(client.position().is_none());
    }

    #[test]
    fn find_blocks_sorted_and_bounded() {
        let client = SimClient::new();
        client.place_block("stone", Position::new(8.0, 64.0, 0.0));
        client.place_block("stone", Position::new(2.0, 64.0, 0.0));
        client.place_block("stone", Position::new(5.0, 64.0, 0.0));
        client.place_block("stone", Position::new(100.0, 64.0, 0.0));

        let found = client.find_blocks(&["stone".into()], 32.0, 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].position.x, 2.0);
        assert_eq!(found[1].position.x, 5.0);
    }

    #[test]
    fn best_tool_prefers_better_pickaxe() {
        let client = SimClient::new();
        client.give("wooden_pickaxe", 1);
        client.give("iron_pickaxe", 1);
        let tool = client.best_tool_for(&BlockRef {
            name: "iron_ore".into(),
            position: Position::new(0.0, 0.0, 0.0),
        });
        assert_eq!(tool.as_deref(), Some("iron_pickaxe"));
    }
}
