//! `craft_item` — craft items through the client's recipe engine.
//!
//! Routes through a nearby crafting table when the recipe needs one;
//! missing materials or a missing table are reported as normal tool
//! failures the model can plan around.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, ParamType, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

/// How far away a crafting table may be.
const TABLE_RANGE: f64 = 6.0;

pub struct CraftItemTool;

#[async_trait]
impl Tool for CraftItemTool {
    fn name(&self) -> &str {
        "craft_item"
    }

    fn description(&self) -> &str {
        "Craft an item by name, using a nearby crafting table when the recipe requires one."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new(
                "itemName",
                ParamType::String,
                "Item to craft, e.g. 'wooden_pickaxe'",
                true,
            ),
            ParamSpec::new("count", ParamType::Number, "How many times to apply the recipe", false)
                .with_range(1.0, 64.0)
                .with_default(json!(1)),
        ]
    }

    async fn run(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let item_name = arguments["itemName"].as_str().unwrap_or_default();
        let count = arguments["count"].as_u64().unwrap_or(1) as u32;

        let recipes = ctx.client.recipes_for(item_name);
        if recipes.is_empty() {
            return Ok(ToolOutcome::fail(format!("No recipe known for {item_name}")));
        }

        let Some(recipe) = recipes.iter().find(|r| ctx.client.can_craft(r, count)) else {
            // Report what the first recipe still needs.
            let missing: Vec<String> = recipes[0]
                .ingredients
                .iter()
                .map(|(name, needed)| format!("{}x {name}", needed * count))
                .collect();
            return Ok(ToolOutcome::fail(format!(
                "Missing materials for {item_name}: needs {}",
                missing.join(", ")
            )));
        };

        let table = if recipe.requires_table {
            let found = ctx
                .client
                .find_blocks(&["crafting_table".to_string()], TABLE_RANGE, 1);
            match found.into_iter().next() {
                Some(table) => Some(table),
                None => {
                    return Ok(ToolOutcome::fail(format!(
                        "{item_name} needs a crafting table and none is within {TABLE_RANGE} blocks"
                    )))
                }
            }
        } else {
            None
        };

        match ctx.client.craft(recipe, count, table).await {
            Ok(()) => {
                let produced = recipe.yield_count * count;
                Ok(ToolOutcome::ok_with(
                    format!("Crafted {produced} {item_name}"),
                    json!({ "item": item_name, "crafted": produced }),
                ))
            }
            Err(e) => Ok(ToolOutcome::fail(format!("Crafting failed: {e}"))),
        }
    }
}
