//! The LLM bridge for clawcraft.
//!
//! Speaks the OpenAI-compatible `/v1/chat/completions` wire protocol,
//! non-streaming and streaming SSE, with tool calls executed locally
//! while the model's response is still arriving.

pub mod openai;
mod stream;

pub use openai::OpenAiCompatBridge;
