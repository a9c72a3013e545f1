//! Error types for the clawcraft domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all clawcraft operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Perception errors ---
    #[error("Perception error: {0}")]
    Perception(#[from] PerceptionError),

    // --- LLM errors ---
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- State machine errors ---
    #[error("State error: {0}")]
    State(#[from] StateError),

    // --- Game client errors ---
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Decision cycle ---
    #[error("Decision cycle error: {0}")]
    DecisionCycle(String),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

#[derive(Debug, Clone, Error)]
pub enum PerceptionError {
    #[error("Bot has not spawned yet (no position)")]
    BotNotSpawned,

    #[error("Observer already running")]
    AlreadyObserving,
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool call ID is required")]
    MissingCallId,

    #[error("Tool name is required")]
    MissingName,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("State callback failed entering {state}: {reason}")]
    CallbackFailed { state: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Bot has not spawned yet")]
    NotSpawned,

    #[error("Capability not available: {0}")]
    Unsupported(String),

    #[error("Action failed: {0}")]
    Action(String),
}
