//! `get_position` — report the bot's current coordinates.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

pub struct GetPositionTool;

#[async_trait]
impl Tool for GetPositionTool {
    fn name(&self) -> &str {
        "get_position"
    }

    fn description(&self) -> &str {
        "Get the bot's current position and dimension."
    }

    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn run(&self, _arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let Some(pos) = ctx.client.position() else {
            return Ok(ToolOutcome::fail("Bot has not spawned yet"));
        };
        Ok(ToolOutcome::ok_with(
            format!("At {pos} in {}", ctx.client.dimension()),
            json!({
                "x": pos.x,
                "y": pos.y,
                "z": pos.z,
                "dimension": ctx.client.dimension(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawcraft_client::SimClient;
    use clawcraft_core::snapshot::Position;
    use std::sync::Arc;

    #[tokio::test]
    async fn reports_position() {
        let client = Arc::new(SimClient::new());
        client.set_position(Position::new(10.0, 70.0, -5.0));
        let ctx = ToolContext::new(client);

        let outcome = GetPositionTool.run(json!({}), &ctx).await.unwrap();
        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data["x"], 10.0);
        assert_eq!(data["dimension"], "overworld");
    }

    #[tokio::test]
    async fn fails_before_spawn() {
        let client = Arc::new(SimClient::new());
        client.set_spawned(false);
        let ctx = ToolContext::new(client);

        let outcome = GetPositionTool.run(json!({}), &ctx).await.unwrap();
        assert!(!outcome.success);
    }
}
