//! Bot activity states and the legal-transition table.
//!
//! The state machine itself (callbacks, history, statistics) lives in the
//! agent crate; this module owns the state vocabulary and which moves are
//! legal, so every crate agrees on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The agent's current coarse activity.
///
/// `Error` is terminal within a session: it is only left by an explicit
/// reset to `Idle` or `Planning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    Idle,
    Planning,
    Mining,
    Crafting,
    Navigating,
    Combat,
    Eating,
    Gathering,
    Building,
    Error,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Idle => "idle",
            BotState::Planning => "planning",
            BotState::Mining => "mining",
            BotState::Crafting => "crafting",
            BotState::Navigating => "navigating",
            BotState::Combat => "combat",
            BotState::Eating => "eating",
            BotState::Gathering => "gathering",
            BotState::Building => "building",
            BotState::Error => "error",
        }
    }

    /// The set of states legally reachable from this one.
    pub fn allowed_destinations(&self) -> &'static [BotState] {
        use BotState::*;
        match self {
            Idle => &[Planning, Eating, Error],
            Planning => &[Mining, Crafting, Navigating, Gathering, Combat, Idle, Error],
            Mining => &[Idle, Navigating, Eating, Combat, Error],
            Crafting => &[Idle, Navigating, Error],
            Navigating => &[Idle, Mining, Crafting, Gathering, Building, Combat, Error],
            Combat => &[Idle, Navigating, Eating, Error],
            Eating => &[Idle, Mining, Navigating, Combat, Error],
            Gathering => &[Idle, Navigating, Mining, Error],
            Building => &[Idle, Navigating, Error],
            Error => &[Idle, Planning],
        }
    }

    /// Whether moving to `to` is legal from this state.
    pub fn can_transition_to(&self, to: BotState) -> bool {
        self.allowed_destinations().contains(&to)
    }
}

impl std::fmt::Display for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: BotState,
    pub to: BotState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
