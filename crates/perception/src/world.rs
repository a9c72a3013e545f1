//! The world perceiver.
//!
//! Samples bot and world state into immutable `WorldSnapshot`s, either on
//! demand or on a periodic timer, and runs the deterministic danger
//! rules. Snapshot publication is atomic: readers always see either the
//! previous complete snapshot or the new one.

use chrono::Utc;
use clawcraft_core::bot::BotClient;
use clawcraft_core::error::PerceptionError;
use clawcraft_core::snapshot::{
    round_distance, BlockCategory, Danger, DangerKind, NearbyBlock, NearbyEntity, Position,
    Severity, WorldSnapshot,
};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Block types worth scanning for: ores, wood, and utility blocks.
const INTERESTING_ORES: &[&str] = &[
    "coal_ore",
    "iron_ore",
    "gold_ore",
    "diamond_ore",
    "redstone_ore",
    "lapis_ore",
    "emerald_ore",
    "ancient_debris",
];

const INTERESTING_WOOD: &[&str] = &[
    "oak_log",
    "birch_log",
    "spruce_log",
    "jungle_log",
    "acacia_log",
    "dark_oak_log",
];

const INTERESTING_UTILITY: &[&str] = &["crafting_table", "furnace", "chest", "lava", "water"];

/// Matches per block type requested from the client on each scan.
const MATCHES_PER_TYPE: usize = 10;

/// How the perceiver scans.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub block_radius: f64,
    pub entity_radius: f64,
    pub interval: Duration,
    pub track_ores: bool,
    pub track_mobs: bool,
    pub track_dangers: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            block_radius: 32.0,
            entity_radius: 32.0,
            interval: Duration::from_secs(5),
            track_ores: true,
            track_mobs: true,
            track_dangers: true,
        }
    }
}

struct ObserverHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic and on-demand sampling of bot/world state.
pub struct WorldPerceiver {
    client: Arc<dyn BotClient>,
    policy: ScanPolicy,
    last_snapshot: RwLock<Option<Arc<WorldSnapshot>>>,
    observer: Mutex<Option<ObserverHandle>>,
}

impl WorldPerceiver {
    pub fn new(client: Arc<dyn BotClient>, policy: ScanPolicy) -> Self {
        Self {
            client,
            policy,
            last_snapshot: RwLock::new(None),
            observer: Mutex::new(None),
        }
    }

    /// The most recently published snapshot.
    pub fn last_snapshot(&self) -> Option<Arc<WorldSnapshot>> {
        self.last_snapshot.read().unwrap().clone()
    }

    /// Produce one snapshot and publish it.
    ///
    /// Fails with `BotNotSpawned` iff the bot has no position yet. Scan
    /// failures never propagate: they degrade to empty lists.
    pub fn observe(&self) -> Result<Arc<WorldSnapshot>, PerceptionError> {
        let position = self.client.position().ok_or(PerceptionError::BotNotSpawned)?;
        let health = self.client.health();
        let food = self.client.food();

        let nearby_blocks = self.scan_blocks(position);
        let nearby_entities = if self.policy.track_mobs {
            self.scan_entities(position)
        } else {
            Vec::new()
        };

        let dangers = if self.policy.track_dangers {
            self.detect_dangers(position, health, food, &nearby_blocks)
        } else {
            Vec::new()
        };

        let snapshot = Arc::new(WorldSnapshot {
            timestamp: Utc::now(),
            position,
            health,
            food,
            dimension: self.client.dimension(),
            nearby_blocks,
            nearby_entities,
            dangers,
            time_of_day: self.client.time_of_day(),
            weather: if self.client.is_raining() {
                "rain".into()
            } else {
                "clear".into()
            },
        });

        debug!(summary = %snapshot.summary(), "Observed world");
        *self.last_snapshot.write().unwrap() = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn scan_blocks(&self, origin: Position) -> Vec<NearbyBlock> {
        let mut types: Vec<&str> = Vec::new();
        if self.policy.track_ores {
            types.extend_from_slice(INTERESTING_ORES);
        }
        types.extend_from_slice(INTERESTING_WOOD);
        types.extend_from_slice(INTERESTING_UTILITY);

        let mut blocks = Vec::new();
        for block_type in types {
            let found = self.client.find_blocks(
                &[block_type.to_string()],
                self.policy.block_radius,
                MATCHES_PER_TYPE,
            );
            for block in found {
                blocks.push(NearbyBlock {
                    category: BlockCategory::of(&block.name),
                    distance: round_distance(origin.distance_to(&block.position)),
                    name: block.name,
                    position: block.position,
                });
            }
        }

        blocks.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        blocks
    }

    fn scan_entities(&self, origin: Position) -> Vec<NearbyEntity> {
        let mut entities: Vec<NearbyEntity> = self
            .client
            .nearby_entities()
            .into_iter()
            .filter(|e| origin.distance_to(&e.position) <= self.policy.entity_radius)
            .map(|e| NearbyEntity {
                distance: round_distance(origin.distance_to(&e.position)),
                name: e.name,
                kind: e.kind,
                position: e.position,
                hostile: e.hostile,
                health: e.health,
            })
            .collect();

        entities.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        entities
    }

    /// Deterministic danger rules, evaluated in a fixed order: vitals,
    /// lava, hostiles (from the previous snapshot), then cliffs.
    fn detect_dangers(
        &self,
        position: Position,
        health: f32,
        food: f32,
        blocks: &[NearbyBlock],
    ) -> Vec<Danger> {
        let mut dangers = Vec::new();

        if health <= 5.0 {
            dangers.push(Danger {
                kind: DangerKind::LowHealth,
                severity: Severity::Critical,
                description: format!("Critical health: {health}/20"),
                position: None,
            });
        } else if health <= 10.0 {
            dangers.push(Danger {
                kind: DangerKind::LowHealth,
                severity: Severity::High,
                description: format!("Low health: {health}/20"),
                position: None,
            });
        }

        if food <= 5.0 {
            dangers.push(Danger {
                kind: DangerKind::LowFood,
                severity: Severity::High,
                description: format!("Critically low food: {food}/20"),
                position: None,
            });
        } else if food <= 10.0 {
            dangers.push(Danger {
                kind: DangerKind::LowFood,
                severity: Severity::Medium,
                description: format!("Low food: {food}/20"),
                position: None,
            });
        }

        // Blocks are sorted, so the first lava is the nearest.
        if let Some(lava) = blocks.iter().find(|b| b.name == "lava") {
            if lava.distance <= 8.0 {
                dangers.push(Danger {
                    kind: DangerKind::Lava,
                    severity: if lava.distance < 3.0 {
                        Severity::Critical
                    } else {
                        Severity::Medium
                    },
                    description: format!("Lava {} blocks away", lava.distance),
                    position: Some(lava.position),
                });
            }
        }

        // Hostiles are read from the previous snapshot so the rule is
        // stable while this snapshot is still being assembled.
        if let Some(previous) = self.last_snapshot() {
            if let Some(hostile) = previous.nearby_entities.iter().find(|e| e.hostile) {
                let severity = if hostile.distance < 5.0 {
                    Severity::Critical
                } else if hostile.distance < 10.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                dangers.push(Danger {
                    kind: DangerKind::HostileMob,
                    severity,
                    description: format!("{} {} blocks away", hostile.name, hostile.distance),
                    position: Some(hostile.position),
                });
            }
        }

        if let Some(cliff) = self.detect_cliff(position) {
            dangers.push(cliff);
        }

        dangers
    }

    /// Scan a 3-block ring around the bot for drops. The first detected
    /// cliff short-circuits.
    fn detect_cliff(&self, position: Position) -> Option<Danger> {
        const RING: f64 = 3.0;
        const MAX_SCAN: i32 = 10;
        let offsets: [(f64, f64); 8] = [
            (RING, 0.0),
            (-RING, 0.0),
            (0.0, RING),
            (0.0, -RING),
            (RING, RING),
            (RING, -RING),
            (-RING, RING),
            (-RING, -RING),
        ];

        for (dx, dz) in offsets {
            let mut drop = MAX_SCAN + 1;
            for depth in 1..=MAX_SCAN {
                let probe = Position::new(
                    position.x + dx,
                    position.y - depth as f64,
                    position.z + dz,
                );
                if self.client.block_at(probe).is_some() {
                    drop = depth - 1;
                    break;
                }
            }

            if drop > 10 {
                return Some(Danger {
                    kind: DangerKind::Cliff,
                    severity: Severity::High,
                    description: format!("Sheer drop of more than 10 blocks {dx:+.0},{dz:+.0} away"),
                    position: Some(Position::new(position.x + dx, position.y, position.z + dz)),
                });
            }
            if drop > 4 {
                return Some(Danger {
                    kind: DangerKind::Cliff,
                    severity: Severity::Medium,
                    description: format!("Drop of {drop} blocks {dx:+.0},{dz:+.0} away"),
                    position: Some(Position::new(position.x + dx, position.y, position.z + dz)),
                });
            }
        }
        None
    }

    // ── Periodic observation ────────────────────────────────────────────

    /// Schedule periodic observation at the configured interval, with one
    /// immediate observation. Calling start while already running is a
    /// no-op warning.
    pub fn start_observing(self: &Arc<Self>) {
        let mut guard = self.observer.lock().unwrap();
        if guard.is_some() {
            warn!("Observer already running, ignoring start");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let perceiver = Arc::clone(self);
        let interval = self.policy.interval;

        let task = tokio::spawn(async move {
            if let Err(e) = perceiver.observe() {
                debug!(error = %e, "Initial observation skipped");
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; already observed
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = perceiver.observe() {
                            debug!(error = %e, "Observation skipped");
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("Observer stopping");
                        return;
                    }
                }
            }
        });

        *guard = Some(ObserverHandle { stop: stop_tx, task });
    }

    /// Cancel the periodic observer. Safe to call when not running.
    pub fn stop_observing(&self) {
        if let Some(handle) = self.observer.lock().unwrap().take() {
            let _ = handle.stop.send(true);
            handle.task.abort();
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observer.lock().unwrap().is_some()
    }

    // ── Auxiliary queries ───────────────────────────────────────────────

    /// Up to 50 blocks of one type within `max_distance`, sorted by
    /// ascending distance.
    pub fn find_nearby_block_type(&self, name: &str, max_distance: f64) -> Vec<NearbyBlock> {
        let Some(origin) = self.client.position() else {
            return Vec::new();
        };
        let mut blocks: Vec<NearbyBlock> = self
            .client
            .find_blocks(&[name.to_string()], max_distance, 50)
            .into_iter()
            .map(|b| NearbyBlock {
                category: BlockCategory::of(&b.name),
                distance: round_distance(origin.distance_to(&b.position)),
                name: b.name,
                position: b.position,
            })
            .collect();
        blocks.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        blocks
    }

    /// Nearest ore in the last snapshot.
    pub fn find_nearest_ore(&self) -> Option<NearbyBlock> {
        self.last_snapshot()?
            .nearby_blocks
            .iter()
            .find(|b| b.category == BlockCategory::Ore)
            .cloned()
    }

    /// Nearest wood in the last snapshot.
    pub fn find_nearest_wood(&self) -> Option<NearbyBlock> {
        self.last_snapshot()?
            .nearby_blocks
            .iter()
            .find(|b| b.category == BlockCategory::Wood)
            .cloned()
    }

    /// A position is unsafe iff any current danger lies within 5 units.
    pub fn is_safe_position(&self, pos: Position) -> bool {
        let Some(snapshot) = self.last_snapshot() else {
            return true;
        };
        !snapshot.dangers.iter().any(|d| {
            d.position
                .map(|p| p.distance_to(&pos) <= 5.0)
                .unwrap_or(false)
        })
    }
}
