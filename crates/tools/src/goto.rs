//! `goto_location` — navigate to coordinates via the pathfinder.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::snapshot::Position;
use clawcraft_core::tool::{ParamSpec, ParamType, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};
use std::time::Duration;

/// Navigation self-cancels after this long.
const NAVIGATION_TIMEOUT_SECS: u64 = 60;

/// How close to the target counts as arrival.
const ARRIVAL_RANGE: f64 = 1.0;

pub struct GotoLocationTool;

#[async_trait]
impl Tool for GotoLocationTool {
    fn name(&self) -> &str {
        "goto_location"
    }

    fn description(&self) -> &str {
        "Walk the bot to the given coordinates using pathfinding."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("x", ParamType::Number, "Target X coordinate", true),
            ParamSpec::new("y", ParamType::Number, "Target Y coordinate", true),
            ParamSpec::new("z", ParamType::Number, "Target Z coordinate", true),
        ]
    }

    async fn run(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let target = Position::new(
            arguments["x"].as_f64().unwrap_or_default(),
            arguments["y"].as_f64().unwrap_or_default(),
            arguments["z"].as_f64().unwrap_or_default(),
        );

        if ctx.client.position().is_none() {
            return Ok(ToolOutcome::fail("Bot has not spawned yet"));
        }

        let navigation = ctx.client.goto(target, ARRIVAL_RANGE);
        match tokio::time::timeout(Duration::from_secs(NAVIGATION_TIMEOUT_SECS), navigation).await {
            Ok(Ok(())) => {
                let arrived = ctx.client.position().unwrap_or(target);
                Ok(ToolOutcome::ok_with(
                    format!("Arrived at {arrived}"),
                    json!({ "x": arrived.x, "y": arrived.y, "z": arrived.z }),
                ))
            }
            Ok(Err(e)) => Ok(ToolOutcome::fail(format!("Navigation failed: {e}"))),
            Err(_) => Err(ToolError::Timeout {
                tool_name: self.name().to_string(),
                timeout_secs: NAVIGATION_TIMEOUT_SECS,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawcraft_core::BotClient;
    use clawcraft_client::SimClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn navigates_to_target() {
        let client = Arc::new(SimClient::new());
        let ctx = ToolContext::new(client.clone());

        let outcome = GotoLocationTool
            .run(json!({"x": 20.0, "y": 64.0, "z": 5.0}), &ctx)
            .await
            .unwrap();
        assert!(outcome.success);
        let pos = client.position().unwrap();
        assert!(pos.distance_to(&Position::new(20.0, 64.0, 5.0)) <= ARRIVAL_RANGE + 1e-9);
    }

    #[tokio::test]
    async fn fails_before_spawn() {
        let client = Arc::new(SimClient::new());
        client.set_spawned(false);
        let ctx = ToolContext::new(client);

        let outcome = GotoLocationTool
            .run(json!({"x": 0.0, "y": 64.0, "z": 0.0}), &ctx)
            .await
            .unwrap();
        assert!(!outcome.success);
    }
}
