//! World observation types.
//!
//! A `WorldSnapshot` is an immutable observation of the world at a
//! timestamp: vitals, nearby blocks and entities (sorted by distance),
//! and detected dangers. Snapshots are produced by the perceiver and
//! never mutated after publication; the next snapshot supersedes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position in the world, in real coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Round a distance to one decimal place, the precision snapshots carry.
pub fn round_distance(d: f64) -> f64 {
    (d * 10.0).round() / 10.0
}

/// Coarse category of a nearby block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Ore,
    Wood,
    Stone,
    Dirt,
    Other,
}

impl BlockCategory {
    /// Categorize a block by its name.
    pub fn of(name: &str) -> Self {
        if name.ends_with("_ore") || name == "ancient_debris" {
            BlockCategory::Ore
        } else if name.ends_with("_log") || name.ends_with("_wood") {
            BlockCategory::Wood
        } else if name.contains("stone") || name == "cobblestone" || name == "andesite" {
            BlockCategory::Stone
        } else if name.contains("dirt") || name == "grass_block" {
            BlockCategory::Dirt
        } else {
            BlockCategory::Other
        }
    }
}

/// A block observed near the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyBlock {
    pub name: String,
    pub position: Position,
    /// Distance from the bot, rounded to one decimal.
    pub distance: f64,
    pub category: BlockCategory,
}

/// An entity observed near the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyEntity {
    pub name: String,
    /// Entity type tag from the client ("mob", "player", "object", ...)
    pub kind: String,
    pub position: Position,
    /// Distance from the bot, rounded to one decimal.
    pub distance: f64,
    pub hostile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
}

/// The kind of a detected danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerKind {
    Lava,
    Cliff,
    HostileMob,
    LowHealth,
    LowFood,
}

/// How pressing a danger is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected danger with a human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Danger {
    pub kind: DangerKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// An immutable observation of the world at a timestamp.
///
/// Invariants: `nearby_blocks` and `nearby_entities` are sorted by
/// ascending distance; distances are rounded to one decimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    /// Health in [0, 20].
    pub health: f32,
    /// Food in [0, 20].
    pub food: f32,
    pub dimension: String,
    pub nearby_blocks: Vec<NearbyBlock>,
    pub nearby_entities: Vec<NearbyEntity>,
    pub dangers: Vec<Danger>,
    pub time_of_day: i64,
    pub weather: String,
}

impl WorldSnapshot {
    /// One-line summary used in situation messages and logs.
    pub fn summary(&self) -> String {
        format!(
            "pos {} | health {}/20 | food {}/20 | {} | {} blocks, {} entities, {} dangers",
            self.position,
            self.health,
            self.food,
            self.dimension,
            self.nearby_blocks.len(),
            self.nearby_entities.len(),
            self.dangers.len()
        )
    }

    /// The most severe danger, if any.
    pub fn worst_danger(&self) -> Option<&Danger> {
        self.dangers.iter().max_by_key(|d| d.severity)
    }
}
