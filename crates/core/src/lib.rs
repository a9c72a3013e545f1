//! # clawcraft Core
//!
//! Domain types, traits, and error definitions for the clawcraft agent.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod bot;
pub mod error;
pub mod goal;
pub mod message;
pub mod provider;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use bot::{BlockRef, BotClient, Capability, ClientEvent, EntityRef, ItemStack, Recipe};
pub use error::{Error, Result};
pub use goal::{Goal, GoalStatus, GoalType, SpeedrunPhase, Task, TaskStatus};
pub use message::{ChatMessage, Role, TokenUsage};
pub use provider::{ChatOptions, ChatOutcome, ExecutedTool, LlmBridge, ResponseFormat};
pub use snapshot::{
    BlockCategory, Danger, DangerKind, NearbyBlock, NearbyEntity, Position, Severity,
    WorldSnapshot,
};
pub use state::{BotState, StateTransition};
pub use storage::{Storage, StoredMessage, WorldStateRow};
pub use tool::{
    Dispatcher, ParamSpec, ParamType, Tool, ToolCall, ToolContext, ToolOutcome, ToolRegistry,
    ToolSpec,
};
