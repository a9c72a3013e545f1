//! The strategic layer.
//!
//! Pure data + logic over an inventory snapshot and vitals, behind the
//! `Strategy` trait so the agent loop never depends on its internals.
//! `SpeedrunStrategy` is the shipped policy: phase detection from
//! inventory, a recommended action per phase, readiness for the next
//! phase, and advancement tips.

use clawcraft_core::goal::SpeedrunPhase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How pressing the recommended action is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// What the strategic layer recommends for the current situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub phase: SpeedrunPhase,
    pub priority: Priority,
    pub action: String,
    pub rationale: String,
    pub estimated_secs: u64,
    pub risks: Vec<String>,
}

/// Whether the run can advance to the next phase, and what is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub missing: Vec<String>,
}

/// A pluggable strategic policy.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Derive the current phase from the inventory alone.
    fn detect_phase(&self, inventory: &HashMap<String, u32>) -> SpeedrunPhase;

    /// Recommend the next action given inventory and vitals.
    fn decide(
        &self,
        inventory: &HashMap<String, u32>,
        health: f32,
        food: f32,
    ) -> StrategyDecision;

    /// Readiness to advance past the current phase.
    fn readiness(&self, inventory: &HashMap<String, u32>) -> Readiness;

    /// Short advancement tips for the current phase.
    fn tips(&self, phase: SpeedrunPhase) -> Vec<&'static str>;
}

/// The five-phase speedrun policy.
pub struct SpeedrunStrategy;

impl SpeedrunStrategy {
    fn has(inventory: &HashMap<String, u32>, item: &str) -> bool {
        inventory.get(item).copied().unwrap_or(0) > 0
    }

    /// Items gating the transition out of each phase.
    fn phase_requirements(phase: SpeedrunPhase) -> &'static [(&'static str, u32)] {
        match phase {
            SpeedrunPhase::EarlyGame => &[("iron_pickaxe", 1)],
            SpeedrunPhase::NetherPrep => &[("obsidian", 10), ("flint_and_steel", 1)],
            SpeedrunPhase::Nether => &[("blaze_rod", 7), ("ender_pearl", 12)],
            SpeedrunPhase::EndPrep => &[("eye_of_ender", 12), ("diamond_pickaxe", 1)],
            SpeedrunPhase::EndFight | SpeedrunPhase::Completed => &[],
        }
    }
}

impl Strategy for SpeedrunStrategy {
    fn name(&self) -> &str {
        "speedrun"
    }

    fn detect_phase(&self, inventory: &HashMap<String, u32>) -> SpeedrunPhase {
        if Self::has(inventory, "dragon_egg") {
            SpeedrunPhase::Completed
        } else if Self::has(inventory, "eye_of_ender") && Self::has(inventory, "diamond_pickaxe") {
            SpeedrunPhase::EndFight
        } else if Self::has(inventory, "blaze_rod") && Self::has(inventory, "ender_pearl") {
            SpeedrunPhase::EndPrep
        } else if Self::has(inventory, "obsidian") && Self::has(inventory, "flint_and_steel") {
            SpeedrunPhase::Nether
        } else if Self::has(inventory, "iron_pickaxe") {
            SpeedrunPhase::NetherPrep
        } else {
            SpeedrunPhase::EarlyGame
        }
    }

    fn decide(
        &self,
        inventory: &HashMap<String, u32>,
        health: f32,
        food: f32,
    ) -> StrategyDecision {
        // Survival overrides strategy.
        if health <= 6.0 {
            return StrategyDecision {
                phase: self.detect_phase(inventory),
                priority: Priority::Critical,
                action: "Retreat from danger and restore health".into(),
                rationale: format!("Health is {health}/20; dying resets the run"),
                estimated_secs: 30,
                risks: vec!["hostile mobs".into()],
            };
        }
        if food <= 6.0 {
            return StrategyDecision {
                phase: self.detect_phase(inventory),
                priority: Priority::High,
                action: "Eat food now".into(),
                rationale: format!("Food is {food}/20; starving stops sprinting and healing"),
                estimated_secs: 10,
                risks: vec![],
            };
        }

        let phase = self.detect_phase(inventory);
        let (priority, action, rationale, estimated_secs, risks): (
            Priority,
            &str,
            &str,
            u64,
            Vec<String>,
        ) = match phase {
            SpeedrunPhase::EarlyGame => (
                Priority::High,
                "Gather wood, craft tools, then mine iron",
                "Iron gear unlocks the nether",
                300,
                vec!["cliffs".into(), "night mobs".into()],
            ),
            SpeedrunPhase::NetherPrep => (
                Priority::High,
                "Collect obsidian and a flint and steel, build the portal",
                "A portal is the only route to blaze rods",
                240,
                vec!["lava".into()],
            ),
            SpeedrunPhase::Nether => (
                Priority::High,
                "Hunt blazes for rods and barter for ender pearls",
                "Rods and pearls make the eyes of ender",
                420,
                vec!["blazes".into(), "lava lakes".into(), "piglins".into()],
            ),
            SpeedrunPhase::EndPrep => (
                Priority::Medium,
                "Craft eyes of ender and locate the stronghold",
                "The stronghold holds the end portal",
                300,
                vec!["getting lost".into()],
            ),
            SpeedrunPhase::EndFight => (
                Priority::Critical,
                "Enter the end, destroy the crystals, slay the dragon",
                "The dragon is the final objective",
                600,
                vec!["the dragon".into(), "the void".into()],
            ),
            SpeedrunPhase::Completed => (
                Priority::Low,
                "Run complete; idle",
                "The dragon is dead",
                0,
                vec![],
            ),
        };

        StrategyDecision {
            phase,
            priority,
            action: action.into(),
            rationale: rationale.into(),
            estimated_secs,
            risks,
        }
    }

    fn readiness(&self, inventory: &HashMap<String, u32>) -> Readiness {
        let phase = self.detect_phase(inventory);
        let missing: Vec<String> = Self::phase_requirements(phase)
            .iter()
            .filter(|(item, needed)| inventory.get(*item).copied().unwrap_or(0) < *needed)
            .map(|(item, needed)| {
                let have = inventory.get(*item).copied().unwrap_or(0);
                format!("{item} ({have}/{needed})")
            })
            .collect();
        Readiness {
            ready: missing.is_empty(),
            missing,
        }
    }

    fn tips(&self, phase: SpeedrunPhase) -> Vec<&'static str> {
        match phase {
            SpeedrunPhase::EarlyGame => vec![
                "A stone pickaxe is enough for iron ore",
                "Keep a stack of food before caving",
            ],
            SpeedrunPhase::NetherPrep => vec![
                "A lava pool plus water bucket beats mining obsidian",
                "Bring fire resistance if you have it",
            ],
            SpeedrunPhase::Nether => vec![
                "Gold armor keeps piglins neutral",
                "Fight blazes from behind cover",
            ],
            SpeedrunPhase::EndPrep => vec![
                "Throw an eye, follow it, repeat",
                "Stock arrows for the crystals",
            ],
            SpeedrunPhase::EndFight => vec![
                "Destroy every crystal before engaging the dragon",
                "Never look at the void",
            ],
            SpeedrunPhase::Completed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(items: &[(&str, u32)]) -> HashMap<String, u32> {
        items.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn phase_ladder_from_inventory() {
        let strategy = SpeedrunStrategy;

        assert_eq!(
            strategy.detect_phase(&inventory(&[])),
            SpeedrunPhase::EarlyGame
        );

        let mut items = inventory(&[("iron_pickaxe", 1)]);
        assert_eq!(strategy.detect_phase(&items), SpeedrunPhase::NetherPrep);

        items.insert("obsidian".into(), 10);
        items.insert("flint_and_steel".into(), 1);
        assert_eq!(strategy.detect_phase(&items), SpeedrunPhase::Nether);

        items.insert("blaze_rod".into(), 7);
        items.insert("ender_pearl".into(), 12);
        assert_eq!(strategy.detect_phase(&items), SpeedrunPhase::EndPrep);

        items.insert("eye_of_ender".into(), 12);
        items.insert("diamond_pickaxe".into(), 1);
        assert_eq!(strategy.detect_phase(&items), SpeedrunPhase::EndFight);
    }

    #[test]
    fn low_health_overrides_phase() {
        let strategy = SpeedrunStrategy;
        let decision = strategy.decide(&inventory(&[("iron_pickaxe", 1)]), 4.0, 20.0);
        assert_eq!(decision.priority, Priority::Critical);
        assert!(decision.action.contains("Retreat"));
    }

    #[test]
    fn low_food_prompts_eating() {
        let strategy = SpeedrunStrategy;
        let decision = strategy.decide(&inventory(&[]), 20.0, 5.0);
        assert_eq!(decision.priority, Priority::High);
        assert!(decision.action.contains("Eat"));
    }

    #[test]
    fn early_game_decision_mentions_iron() {
        let strategy = SpeedrunStrategy;
        let decision = strategy.decide(&inventory(&[]), 20.0, 20.0);
        assert_eq!(decision.phase, SpeedrunPhase::EarlyGame);
        assert!(decision.rationale.contains("Iron"));
        assert!(!decision.risks.is_empty());
    }

    #[test]
    fn readiness_lists_missing_requirements() {
        let strategy = SpeedrunStrategy;

        let not_ready = strategy.readiness(&inventory(&[]));
        assert!(!not_ready.ready);
        assert_eq!(not_ready.missing, vec!["iron_pickaxe (0/1)".to_string()]);

        let ready = strategy.readiness(&inventory(&[("iron_pickaxe", 1)]));
        // NetherPrep now: needs obsidian and flint and steel.
        assert!(!ready.ready);
        assert_eq!(ready.missing.len(), 2);

        let portal_ready = strategy.readiness(&inventory(&[
            ("iron_pickaxe", 1),
            ("obsidian", 10),
            ("flint_and_steel", 1),
            ("blaze_rod", 7),
            ("ender_pearl", 12),
        ]));
        // EndPrep now: missing eyes and the diamond pickaxe.
        assert!(!portal_ready.ready);
    }

    #[test]
    fn every_active_phase_has_tips() {
        let strategy = SpeedrunStrategy;
        for phase in [
            SpeedrunPhase::EarlyGame,
            SpeedrunPhase::NetherPrep,
            SpeedrunPhase::Nether,
            SpeedrunPhase::EndPrep,
            SpeedrunPhase::EndFight,
        ] {
            assert!(!strategy.tips(phase).is_empty(), "no tips for {phase:?}");
        }
    }
}
