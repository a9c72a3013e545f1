//! Storage port — durable CRUD over goals, messages, and world states.
//!
//! Implementations live outward (the store crate); the agent and memory
//! crates depend only on this trait. The port offers durable, ordered
//! append with monotonic ids. I/O failures surface as a single
//! `StorageError` kind; there is no retry logic at this layer.

use crate::error::StorageError;
use crate::goal::{Goal, GoalStatus};
use crate::message::Role;
use crate::snapshot::Position;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted conversation message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted world-state row (vitals only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldStateRow {
    pub id: i64,
    pub position: Position,
    pub health: f32,
    pub food: f32,
    pub dimension: String,
    pub created_at: DateTime<Utc>,
}

/// The persistence contract.
///
/// `recent_messages(n)` returns the last n messages **newest first**;
/// this ordering is part of the contract and the single consumer
/// (`AgentMemory::load_from_storage`) reverses it to restore chronology.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a goal with all its fields.
    async fn insert_goal(&self, goal: &Goal) -> Result<(), StorageError>;

    /// Fetch a goal by id.
    async fn goal(&self, id: &str) -> Result<Option<Goal>, StorageError>;

    /// Set a goal's status. `completed_at` is set to now iff the new
    /// status is `Completed`, and cleared otherwise.
    async fn update_goal_status(&self, id: &str, status: GoalStatus) -> Result<(), StorageError>;

    /// All pending goals, sorted by priority ascending.
    async fn pending_goals(&self) -> Result<Vec<Goal>, StorageError>;

    /// Append a message; returns its monotonically increasing id.
    async fn insert_message(&self, role: Role, content: &str) -> Result<i64, StorageError>;

    /// The last `n` messages in reverse insertion order (newest first).
    async fn recent_messages(&self, n: u32) -> Result<Vec<StoredMessage>, StorageError>;

    /// Permanently remove all but the `keep_last` highest-id messages.
    /// Returns how many rows were deleted.
    async fn clear_old_messages(&self, keep_last: u32) -> Result<u64, StorageError>;

    /// Append a timestamped world-state row; returns its id.
    async fn insert_world_state(
        &self,
        position: Position,
        health: f32,
        food: f32,
        dimension: &str,
    ) -> Result<i64, StorageError>;

    /// The most recent world-state row, if any.
    async fn latest_world_state(&self) -> Result<Option<WorldStateRow>, StorageError>;
}
