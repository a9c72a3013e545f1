//! `get_nearby_blocks` — search for blocks of one type around the bot.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::snapshot::round_distance;
use clawcraft_core::tool::{ParamSpec, ParamType, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

const MAX_RESULTS: usize = 20;

pub struct GetNearbyBlocksTool;

#[async_trait]
impl Tool for GetNearbyBlocksTool {
    fn name(&self) -> &str {
        "get_nearby_blocks"
    }

    fn description(&self) -> &str {
        "Find blocks of a given type near the bot, sorted by distance."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new(
                "blockType",
                ParamType::String,
                "Block name to search for, e.g. 'iron_ore'",
                true,
            ),
            ParamSpec::new(
                "maxDistance",
                ParamType::Number,
                "Search radius in blocks",
                false,
            )
            .with_range(1.0, 128.0)
            .with_default(json!(32.0)),
        ]
    }

    async fn run(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let block_type = arguments["blockType"].as_str().unwrap_or_default();
        let max_distance = arguments["maxDistance"].as_f64().unwrap_or(32.0);

        let Some(origin) = ctx.client.position() else {
            return Ok(ToolOutcome::fail("Bot has not spawned yet"));
        };

        let mut found = ctx
            .client
            .find_blocks(&[block_type.to_string()], max_distance, MAX_RESULTS);
        found.sort_by(|a, b| {
            origin
                .distance_to(&a.position)
                .total_cmp(&origin.distance_to(&b.position))
        });

        let listing: Vec<Value> = found
            .iter()
            .map(|b| {
                json!({
                    "name": b.name,
                    "x": b.position.x,
                    "y": b.position.y,
                    "z": b.position.z,
                    "distance": round_distance(origin.distance_to(&b.position)),
                })
            })
            .collect();

        Ok(ToolOutcome::ok_with(
            format!(
                "Found {} {block_type} within {max_distance} blocks",
                found.len()
            ),
            json!({ "blocks": listing }),
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
    async fn finds_sorted_blocks() {
        let client = Arc::new(SimClient::new());
        client.place_block("iron_ore", Position::new(9.0, 64.0, 0.0));
        client.place_block("iron_ore", Position::new(3.0, 64.0, 0.0));
        client.place_block("coal_ore", Position::new(1.0, 64.0, 0.0));
        let ctx = ToolContext::new(client);

        let outcome = GetNearbyBlocksTool
            .run(json!({"blockType": "iron_ore", "maxDistance": 32.0}), &ctx)
            .await
            .unwrap();
        assert!(outcome.success);
        let blocks = outcome.data.unwrap()["blocks"].as_array().unwrap().clone();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["distance"], 3.0);
        assert_eq!(blocks[1]["distance"], 9.0);
    }

    #[tokio::test]
    async fn empty_when_out_of_range() {
        let client = Arc::new(SimClient::new());
        client.place_block("iron_ore", Position::new(100.0, 64.0, 0.0));
        let ctx = ToolContext::new(client);

        let outcome = GetNearbyBlocksTool
            .run(json!({"blockType": "iron_ore", "maxDistance": 16.0}), &ctx)
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.data.unwrap()["blocks"].as_array().unwrap().is_empty());
    }
}
