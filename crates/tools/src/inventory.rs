//! `get_inventory` — list the bot's inventory contents.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

const TOTAL_SLOTS: usize = 36;

pub struct GetInventoryTool;

#[async_trait]
impl Tool for GetInventoryTool {
    fn name(&self) -> &str {
        "get_inventory"
    }

    fn description(&self) -> &str {
        "List all items in the bot's inventory with counts and slot usage."
    }

    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn run(&self, _arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let items = ctx.client.inventory_items();
        let used = items.len();
        let total: u32 = items.iter().map(|s| s.count).sum();

        let listing: Vec<Value> = items
            .iter()
            .map(|s| json!({ "name": s.name, "count": s.count }))
            .collect();

        Ok(ToolOutcome::ok_with(
            format!("{total} items across {used}/{TOTAL_SLOTS} slots"),
            json!({
                "items": listing,
                "total_items": total,
                "used_slots": used,
                "free_slots": TOTAL_SLOTS.saturating_sub(used),
            }),
        ))
    }
}
