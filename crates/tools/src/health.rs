//! `get_health` — report current vitals.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

pub struct GetHealthTool;

#[async_trait]
impl Tool for GetHealthTool {
    fn name(&self) -> &str {
        "get_health"
    }

    fn description(&self) -> &str {
        "Get the bot's current health and food levels (each out of 20)."
    }

    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn run(&self, _arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let health = ctx.client.health();
        let food = ctx.client.food();
        Ok(ToolOutcome::ok_with(
            format!("Health {health}/20, food {food}/20"),
            json!({ "health": health, "food": food }),
        ))
    }
}
