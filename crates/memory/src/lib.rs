//! Bounded conversational memory.
//!
//! `AgentMemory` holds the ordered message sequence, a singleton system
//! message, the latest world summary, active goals, and the last token
//! usage. Appends trigger token-budgeted trimming; `build_context`
//! assembles the exact sequence sent to the LLM.
//!
//! The system message lives outside the ordered sequence and is never
//! trimmed. Token usage is best-effort most recent (streaming exchanges
//! may not report it), so trimming also fires on raw message count.

use clawcraft_core::error::StorageError;
use clawcraft_core::goal::{Goal, GoalStatus};
use clawcraft_core::message::{ChatMessage, TokenUsage};
use clawcraft_core::snapshot::{Position, WorldSnapshot};
use clawcraft_core::storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous game agent working toward completing \
a speedrun. Observe the situation, reason briefly, and act through the provided tools. Prefer \
concrete actions over commentary.";

/// Trim when the raw message count exceeds this multiple of
/// `keep_messages`, independent of token usage.
const COUNT_TRIM_FACTOR: usize = 4;

/// What the assembled context should include beyond the messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContextOptions {
    pub include_world_state: bool,
    pub include_goals: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            include_world_state: true,
            include_goals: true,
        }
    }
}

/// The vitals summary retained from the latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSummary {
    pub position: Position,
    pub health: f32,
    pub food: f32,
    pub dimension: String,
    pub dangers: usize,
}

/// Bounded conversational context with token-budgeted eviction.
pub struct AgentMemory {
    system_content: Option<String>,
    messages: Vec<ChatMessage>,
    world: Option<WorldSummary>,
    active_goals: Vec<Goal>,
    token_usage: TokenUsage,
    max_tokens: u32,
    keep_messages: usize,
    /// Messages before this index have already been flushed to storage.
    saved_watermark: usize,
}

impl AgentMemory {
    pub fn new(max_tokens: u32, keep_messages: usize) -> Self {
        Self {
            system_content: None,
            messages: Vec::new(),
            world: None,
            active_goals: Vec::new(),
            token_usage: TokenUsage::default(),
            max_tokens,
            keep_messages: keep_messages.max(1),
            saved_watermark: 0,
        }
    }

    /// Replace the singleton system message.
    pub fn set_system_message(&mut self, content: impl Into<String>) {
        self.system_content = Some(content.into());
    }

    /// Append a message and apply the trimming policy.
    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.auto_trim();
    }

    fn auto_trim(&mut self) {
        let over_budget = self.token_usage.prompt_tokens > self.max_tokens;
        let over_count = self.messages.len() > self.keep_messages * COUNT_TRIM_FACTOR;
        if !over_budget && !over_count {
            return;
        }
        if self.messages.len() <= self.keep_messages {
            return;
        }
        let drop = self.messages.len() - self.keep_messages;
        self.messages.drain(..drop);
        self.saved_watermark = self.saved_watermark.saturating_sub(drop);
        debug!(
            dropped = drop,
            kept = self.keep_messages,
            prompt_tokens = self.token_usage.prompt_tokens,
            "Trimmed conversation memory"
        );
    }

    /// Record the latest snapshot's vitals for context assembly.
    pub fn set_world_state(&mut self, snapshot: &WorldSnapshot) {
        self.world = Some(WorldSummary {
            position: snapshot.position,
            health: snapshot.health,
            food: snapshot.food,
            dimension: snapshot.dimension.clone(),
            dangers: snapshot.dangers.len(),
        });
    }

    /// Replace the set of goals offered to the context builder.
    pub fn set_active_goals(&mut self, goals: Vec<Goal>) {
        self.active_goals = goals;
    }

    /// Record usage from the most recent exchange.
    pub fn update_token_usage(&mut self, usage: TokenUsage) {
        self.token_usage = usage;
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.token_usage
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Drop all messages (system message and summaries are kept).
    pub fn clear(&mut self) {
        self.messages.clear();
        self.saved_watermark = 0;
    }

    /// Assemble the ordered sequence sent to the LLM: one synthesized
    /// system message, then the stored messages in chronological order.
    pub fn build_context(&self, options: ContextOptions) -> Vec<ChatMessage> {
        let mut system = self
            .system_content
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        if options.include_world_state {
            if let Some(world) = &self.world {
                system.push_str(&format!(
                    "\n\nCurrent state: position {} | health {}/20 | food {}/20 | dimension {} | {} active danger(s)",
                    world.position, world.health, world.food, world.dimension, world.dangers
                ));
            }
        }

        if options.include_goals {
            let open: Vec<&Goal> = self
                .active_goals
                .iter()
                .filter(|g| matches!(g.status, GoalStatus::Pending | GoalStatus::InProgress))
                .collect();
            if !open.is_empty() {
                system.push_str("\n\nActive goals:");
                for goal in open {
                    system.push_str(&format!(
                        "\n- [{}] {}",
                        goal.status.as_str(),
                        goal.description
                    ));
                }
            }
        }

        let mut context = Vec::with_capacity(self.messages.len() + 1);
        context.push(ChatMessage::system(system));
        context.extend(self.messages.iter().cloned());
        context
    }

    /// Append every in-memory message to the storage port.
    pub async fn save_to_storage(&self, storage: &dyn Storage) -> Result<(), StorageError> {
        for message in &self.messages {
            storage.insert_message(message.role, &message.content).await?;
        }
        Ok(())
    }

    /// Append only the messages added since the last flush. The decision
    /// cycle persists every cycle; flushing from a watermark keeps the
    /// durable log append-only without duplicating rows.
    pub async fn flush_to_storage(&mut self, storage: &dyn Storage) -> Result<usize, StorageError> {
        let pending = &self.messages[self.saved_watermark.min(self.messages.len())..];
        let mut written = 0;
        for message in pending {
            storage.insert_message(message.role, &message.content).await?;
            written += 1;
        }
        self.saved_watermark = self.messages.len();
        Ok(written)
    }

    /// Replace the in-memory list with the `n` most recent stored rows,
    /// reversed into chronological order (the port returns newest-first).
    pub async fn load_from_storage(
        &mut self,
        storage: &dyn Storage,
        n: u32,
    ) -> Result<usize, StorageError> {
        let mut rows = storage.recent_messages(n).await?;
        rows.reverse();
        self.messages = rows
            .into_iter()
            .map(|row| ChatMessage {
                role: row.role,
                content: row.content,
                tool_calls: Vec::new(),
                tool_call_id: None,
            })
            .collect();
        // Loaded rows are already durable.
        self.saved_watermark = self.messages.len();
        Ok(self.messages.len())
    }
}
