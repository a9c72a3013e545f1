//! The game client port — the capability bundle the agent acts through.
//!
//! Everything the agent knows about or does to the world goes through
//! `BotClient`. The real protocol client lives out of tree; this crate
//! defines the surface and the value types crossing it. Sub-capabilities
//! (pathfinding, auto-eat, PVP, collect, armor, best-tool) may be absent
//! and degrade to no-ops — callers probe with `has_capability`.

use crate::error::ClientError;
use crate::snapshot::Position;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A stack of items in the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
    /// Inventory slot index, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
}

/// A block reference in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRef {
    pub name: String,
    pub position: Position,
}

/// An entity reference in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    /// Entity type tag ("mob", "player", "object", ...)
    pub kind: String,
    pub position: Position,
    pub hostile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
}

/// A crafting recipe as the client's recipe engine reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Item the recipe produces.
    pub result: String,
    /// How many of the result one application yields.
    pub yield_count: u32,
    /// (ingredient name, required count) pairs.
    pub ingredients: Vec<(String, u32)>,
    pub requires_table: bool,
}

/// Events the client pushes to subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// An item entered the bot's own inventory.
    ItemAdded { item: String, count: u32 },
    /// An item left the bot's inventory (dropped or consumed).
    ItemDropped { item: String, count: u32 },
    /// The bot took damage.
    Damaged { health: f32 },
    Died,
    Disconnected,
}

/// Optional sub-capabilities of the client bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Pathfinder,
    AutoEat,
    Pvp,
    CollectBlock,
    ArmorManager,
    BestTool,
}

/// The game client contract (see the external-interface section of the
/// design docs). All world reads are cheap synchronous accessors backed
/// by the client's local world model; actions are async and may suspend
/// on game-protocol I/O.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Current position, or `None` until the bot has spawned.
    fn position(&self) -> Option<Position>;

    /// Health in [0, 20].
    fn health(&self) -> f32;

    /// Food in [0, 20].
    fn food(&self) -> f32;

    /// Dimension tag ("overworld", "the_nether", "the_end").
    fn dimension(&self) -> String;

    fn time_of_day(&self) -> i64;

    fn is_raining(&self) -> bool;

    /// All stacks currently in the bot's inventory.
    fn inventory_items(&self) -> Vec<ItemStack>;

    /// Find up to `count` blocks whose name is in `matching`, within
    /// `max_distance` of the bot.
    fn find_blocks(&self, matching: &[String], max_distance: f64, count: usize) -> Vec<BlockRef>;

    /// The block at an exact position, if loaded.
    fn block_at(&self, pos: Position) -> Option<BlockRef>;

    /// All live entities excluding the bot itself.
    fn nearby_entities(&self) -> Vec<EntityRef>;

    /// Recipes the client knows for an item.
    fn recipes_for(&self, item: &str) -> Vec<Recipe>;

    /// Whether the given recipe can be applied `count` times right now.
    fn can_craft(&self, recipe: &Recipe, count: u32) -> bool;

    /// Whether an optional sub-capability is present.
    fn has_capability(&self, cap: Capability) -> bool;

    /// Best tool in inventory for breaking a block, when the capability
    /// exists.
    fn best_tool_for(&self, block: &BlockRef) -> Option<String>;

    /// Equip an item by name into a destination slot ("hand", "head", ...).
    async fn equip(&self, item: &str, destination: &str) -> Result<(), ClientError>;

    /// Consume the currently held item (food).
    async fn consume(&self) -> Result<(), ClientError>;

    /// Dig out a block.
    async fn dig(&self, block: &BlockRef) -> Result<(), ClientError>;

    /// Apply a recipe `count` times, optionally through a crafting table.
    async fn craft(
        &self,
        recipe: &Recipe,
        count: u32,
        table: Option<BlockRef>,
    ) -> Result<(), ClientError>;

    /// Navigate to within `range` of a position. No-op when the
    /// pathfinder capability is absent.
    async fn goto(&self, pos: Position, range: f64) -> Result<(), ClientError>;

    /// Pick up item drops near a position; returns how many entities were
    /// collected. No-op (0) when the collect capability is absent.
    async fn collect_drops(&self, near: Position) -> Result<u32, ClientError>;

    /// Subscribe to client events.
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;
}

/// Minimal inert client for unit tests inside this crate.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    #[derive(Default)]
    pub struct StubClient;

    #[async_trait]
    impl BotClient for StubClient {
        fn position(&self) -> Option<Position> {
            Some(Position::new(0.0, 64.0, 0.0))
        }
        fn health(&self) -> f32 {
            20.0
        }
        fn food(&self) -> f32 {
            20.0
        }
        fn dimension(&self) -> String {
            "overworld".into()
        }
        fn time_of_day(&self) -> i64 {
            0
        }
        fn is_raining(&self) -> bool {
            false
        }
        fn inventory_items(&self) -> Vec<ItemStack> {
            Vec::new()
        }
        fn find_blocks(&self, _: &[String], _: f64, _: usize) -> Vec<BlockRef> {
            Vec::new()
        }
        fn block_at(&self, _: Position) -> Option<BlockRef> {
            None
        }
        fn nearby_entities(&self) -> Vec<EntityRef> {
            Vec::new()
        }
        fn recipes_for(&self, _: &str) -> Vec<Recipe> {
            Vec::new()
        }
        fn can_craft(&self, _: &Recipe, _: u32) -> bool {
            false
        }
        fn has_capability(&self, _: Capability) -> bool {
            false
        }
        fn best_tool_for(&self, _: &BlockRef) -> Option<String> {
            None
        }
        async fn equip(&self, _: &str, _: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn consume(&self) -> Result<(), ClientError> {
            Ok(())
        }
        async fn dig(&self, _: &BlockRef) -> Result<(), ClientError> {
            Ok(())
        }
        async fn craft(&self, _: &Recipe, _: u32, _: Option<BlockRef>) -> Result<(), ClientError> {
            Ok(())
        }
        async fn goto(&self, _: Position, _: f64) -> Result<(), ClientError> {
            Ok(())
        }
        async fn collect_drops(&self, _: Position) -> Result<u32, ClientError> {
            Ok(0)
        }
        fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
            broadcast::channel(1).1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_serialization_roundtrip() {
        let recipe = Recipe {
            result: "wooden_pickaxe".into(),
            yield_count: 1,
            ingredients: vec![("oak_planks".into(), 3), ("stick".into(), 2)],
            requires_table: true,
        };
        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back.result, "wooden_pickaxe");
        assert!(back.requires_table);
        assert_eq!(back.ingredients.len(), 2);
    }

    #[test]
    fn item_stack_defaults_slot_to_none() {
        let json = r#"{"name":"cobblestone","count":64}"#;
        let stack: ItemStack = serde_json::from_str(json).unwrap();
        assert_eq!(stack.count, 64);
        assert!(stack.slot.is_none());
    }
}
