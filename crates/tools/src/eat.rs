//! `eat_food` — eat the best available food item.
//!
//! Refuses when the bot is nearly sated, and prefers cooked food over
//! raw snacks by a fixed preference order.

use async_trait::async_trait;
use clawcraft_core::error::ToolError;
use clawcraft_core::tool::{ParamSpec, Tool, ToolContext, ToolOutcome};
use serde_json::{json, Value};

/// No point eating above this food level.
const SATED_THRESHOLD: f32 = 18.0;

/// Best first.
const FOOD_PREFERENCE: &[&str] = &[
    "golden_apple",
    "cooked_beef",
    "cooked_porkchop",
    "cooked_mutton",
    "cooked_chicken",
    "cooked_salmon",
    "cooked_cod",
    "baked_potato",
    "bread",
    "apple",
    "carrot",
    "melon_slice",
    "cookie",
];

pub struct EatFoodTool;

#[async_trait]
impl Tool for EatFoodTool {
    fn name(&self) -> &str {
        "eat_food"
    }

    fn description(&self) -> &str {
        "Eat the best food item in the inventory to restore hunger."
    }

    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn run(&self, _arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let food = ctx.client.food();
        if food >= SATED_THRESHOLD {
            return Ok(ToolOutcome::fail(format!(
                "Not hungry enough to eat (food {food}/20)"
            )));
        }

        let items = ctx.client.inventory_items();
        let Some(choice) = FOOD_PREFERENCE
            .iter()
            .find(|name| items.iter().any(|s| s.name == **name))
        else {
            return Ok(ToolOutcome::fail("No food in inventory"));
        };

        if let Err(e) = ctx.client.equip(choice, "hand").await {
            return Ok(ToolOutcome::fail(format!("Could not hold {choice}: {e}")));
        }
        if let Err(e) = ctx.client.consume().await {
            return Ok(ToolOutcome::fail(format!("Could not eat {choice}: {e}")));
        }

        let after = ctx.client.food();
        Ok(ToolOutcome::ok_with(
            format!("Ate {choice}, food now {after}/20"),
            json!({ "ate": choice, "food": after }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawcraft_core::BotClient;
    use clawcraft_client::SimClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn eats_preferred_food() {
        let client = Arc::new(SimClient::new());
        client.set_vitals(20.0, 10.0);
        client.give("bread", 2);
        client.give("cooked_beef", 1);
        let ctx = ToolContext::new(client.clone());

        let outcome = EatFoodTool.run(json!({}), &ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["ate"], "cooked_beef");
        assert!(!client.inventory_items().iter().any(|s| s.name == "cooked_beef"));
    }

    #[tokio::test]
    async fn refuses_when_sated() {
        let client = Arc::new(SimClient::new());
        client.set_vitals(20.0, 19.0);
        client.give("bread", 1);
        let ctx = ToolContext::new(client);

        let outcome = EatFoodTool.run(json!({}), &ctx).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Not hungry"));
    }

    #[tokio::test]
    async fn fails_without_food() {
        let client = Arc::new(SimClient::new());
        client.set_vitals(20.0, 5.0);
        let ctx = ToolContext::new(client);

        let outcome = EatFoodTool.run(json!({}), &ctx).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("No food"));
    }
}
