//! Perception for clawcraft: periodic world observation and event-driven
//! inventory tracking.

pub mod inventory;
pub mod world;

pub use inventory::{
    CategorizedItems, ChangeKind, InventoryChange, InventorySummary, InventoryTracker,
    ResourceCheck,
};
pub use world::{ScanPolicy, WorldPerceiver};
