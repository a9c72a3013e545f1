//! The clawcraft agent: activity state machine, task planning, the
//! strategic layer, and the decision cycle that ties perception, memory,
//! tools, and the LLM bridge together.

pub mod planner;
pub mod runner;
pub mod state;
pub mod strategy;

pub use planner::TaskPlanner;
pub use runner::{AgentRunner, CycleReport, RunnerConfig, RunnerStats};
pub use state::{StateCallback, StateMachine};
pub use strategy::{Priority, Readiness, SpeedrunStrategy, Strategy, StrategyDecision};
