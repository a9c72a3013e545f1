//! The canonical clawcraft tool set.
//!
//! Each tool is a small actor on the game client: it reads or mutates
//! the world and reports a normalized outcome. Declarations drive
//! validation in the dispatcher, so handlers see bound arguments only.

pub mod craft;
pub mod eat;
pub mod goto;
pub mod health;
pub mod inventory;
pub mod mine;
pub mod nearby_blocks;
pub mod position;

pub use craft::CraftItemTool;
pub use eat::EatFoodTool;
pub use goto::GotoLocationTool;
pub use health::GetHealthTool;
pub use inventory::GetInventoryTool;
pub use mine::MineBlockTool;
pub use nearby_blocks::GetNearbyBlocksTool;
pub use position::GetPositionTool;

use clawcraft_core::tool::ToolRegistry;

/// Build a registry holding the full canonical tool set.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GetPositionTool));
    registry.register(Box::new(GetHealthTool));
    registry.register(Box::new(GetInventoryTool));
    registry.register(Box::new(GetNearbyBlocksTool));
    registry.register(Box::new(GotoLocationTool));
    registry.register(Box::new(MineBlockTool));
    registry.register(Box::new(CraftItemTool));
    registry.register(Box::new(EatFoodTool));
    registry
}
