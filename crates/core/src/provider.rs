//! LLM bridge trait — the abstraction over the remote model service.
//!
//! The bridge knows how to send a message list to an LLM endpoint and get
//! a response back: complete, token-streamed, or streamed with inline
//! tool execution. The agent loop calls it without knowing which backend
//! is configured.

use crate::error::LlmError;
use crate::message::{ChatMessage, TokenUsage};
use crate::tool::{Dispatcher, ToolCall, ToolOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Sampling and format knobs for one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            top_p: None,
            response_format: ResponseFormat::Text,
        }
    }
}

/// How the model should shape its response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text (default).
    #[default]
    Text,
    /// Any valid JSON object.
    JsonObject,
    /// JSON conforming to a named schema.
    JsonSchema {
        name: String,
        strict: bool,
        schema: Value,
    },
}

/// A tool call the bridge executed during an exchange, with its result.
#[derive(Debug, Clone)]
pub struct ExecutedTool {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
}

/// The result of one exchange with the model.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    /// Accumulated text content.
    pub content: String,

    /// Tools executed during the exchange, in stream arrival order.
    pub executed: Vec<ExecutedTool>,

    /// Token usage, when the backend reported it.
    pub usage: Option<TokenUsage>,
}

impl ChatOutcome {
    /// The calls alone, in execution order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.executed.iter().map(|e| &e.call).collect()
    }

    /// The last tool executed in the exchange, if any.
    pub fn last_executed(&self) -> Option<&ExecutedTool> {
        self.executed.last()
    }
}

/// The LLM bridge contract.
///
/// `chat_with_tools` is the streaming tool-calling exchange: tool
/// invocations are dispatched locally while the model's response is
/// still arriving, and their outputs are fed back until the model ends
/// the exchange.
#[async_trait]
pub trait LlmBridge: Send + Sync {
    /// A human-readable backend name ("openai", "openrouter", ...).
    fn name(&self) -> &str;

    /// A single non-streaming exchange.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError>;

    /// Token-level streaming without tools. The receiver yields text
    /// fragments in arrival order.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError>;

    /// The streaming tool-calling exchange. Tool calls are resolved
    /// through the dispatcher as the stream emits them; the caller sees
    /// the full execution record after the stream terminates.
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        dispatcher: &Dispatcher,
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError>;
}
