//! `mine_block` — find, approach, and dig blocks of a type.
//!
//! Equips the best tool for the block when that capability exists, and
//! picks up the drops afterwards when the collect capability exists.

use async_trait::async_trait;
use clawcraft_core::bot::Capability;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, ParamType, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};
use tracing::debug;

const SEARCH_RADIUS: f64 = 32.0;

/// Blocks further than this are walked to before digging.
const REACH: f64 = 4.5;

pub struct MineBlockTool;

#[async_trait]
impl Tool for MineBlockTool {
    fn name(&self) -> &str {
        "mine_block"
    }

    fn description(&self) -> &str {
        "Mine a number of blocks of the given type, walking to each and collecting the drops."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new(
                "blockType",
                ParamType::String,
                "Block name to mine, e.g. 'oak_log' or 'iron_ore'",
                true,
            ),
            ParamSpec::new("count", ParamType::Number, "How many blocks to mine", false)
                .with_range(1.0, 64.0)
                .with_default(json!(1)),
        ]
    }

    async fn run(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let block_type = arguments["blockType"].as_str().unwrap_or_default();
        let count = arguments["count"].as_u64().unwrap_or(1) as usize;

        let Some(origin) = ctx.client.position() else {
            return Ok(ToolOutcome::fail("Bot has not spawned yet"));
        };

        let targets = ctx
            .client
            .find_blocks(&[block_type.to_string()], SEARCH_RADIUS, count);
        if targets.is_empty() {
            return Ok(ToolOutcome::fail(format!(
                "No {block_type} found within {SEARCH_RADIUS} blocks"
            )));
        }

        // Equip the best tool once for the whole batch.
        if ctx.client.has_capability(Capability::BestTool) {
            if let Some(tool) = ctx.client.best_tool_for(&targets[0]) {
                if let Err(e) = ctx.client.equip(&tool, "hand").await {
                    debug!(error = %e, "Could not equip {tool}, digging bare-handed");
                }
            }
        }

        let mut mined = 0usize;
        let mut last_pos = origin;
        for block in &targets {
            let current = ctx.client.position().unwrap_or(last_pos);
            if current.distance_to(&block.position) > REACH {
                if let Err(e) = ctx.client.goto(block.position, REACH - 1.0).await {
                    debug!(error = %e, "Could not reach block, skipping");
                    continue;
                }
            }
            match ctx.client.dig(block).await {
                Ok(()) => {
                    mined += 1;
                    last_pos = block.position;
                }
                Err(e) => debug!(block = %block.name, error = %e, "Dig failed"),
            }
        }

        if mined == 0 {
            return Ok(ToolOutcome::fail(format!(
                "Could not mine any {block_type}"
            )));
        }

        let collected = if ctx.client.has_capability(Capability::CollectBlock) {
            ctx.client.collect_drops(last_pos).await.unwrap_or(0)
        } else {
            0
        };

        Ok(ToolOutcome::ok_with(
            format!("Mined {mined} {block_type}"),
            json!({ "mined": mined, "collected": collected, "blockType": block_type }),
        ))
    }
}
