//! OpenAI-compatible bridge implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint that
//! speaks `/v1/chat/completions`. Supports non-streaming chat, token
//! streaming, and the streaming tool-calling exchange where calls are
//! dispatched locally as the stream emits them.

use crate::stream::{StreamAssembler, StreamEvent, StreamResponse};
use async_trait::async_trait;
use clawcraft_core::error::LlmError;
use clawcraft_core::message::{AssistantToolCall, ChatMessage, TokenUsage};
use clawcraft_core::provider::{ChatOptions, ChatOutcome, ExecutedTool, LlmBridge, ResponseFormat};
use clawcraft_core::tool::{Dispatcher, ToolSpec};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM bridge.
pub struct OpenAiCompatBridge {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tool_iterations: u32,
    client: reqwest::Client,
}

impl OpenAiCompatBridge {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tool_iterations: 8,
            client,
        }
    }

    /// Create an OpenAI bridge (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an OpenRouter bridge (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama bridge (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    /// Bound on model↔tool continuation rounds per exchange.
    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    /// Convert our messages to OpenAI API format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool declarations to OpenAI API format.
    fn to_api_tools(specs: &[ToolSpec]) -> Vec<Value> {
        specs
            .iter()
            .map(|s| {
                json!({
                    "type": "function",
                    "function": {
                        "name": s.name,
                        "description": s.description,
                        "parameters": s.to_json_schema(),
                    }
                })
            })
            .collect()
    }

    fn build_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        tools: Option<&[ToolSpec]>,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "stream": stream,
        });

        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        match &options.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonObject => {
                body["response_format"] = json!({ "type": "json_object" });
            }
            ResponseFormat::JsonSchema {
                name,
                strict,
                schema,
            } => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "strict": strict, "schema": schema },
                });
            }
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::to_api_tools(tools));
            }
        }
        body
    }

    async fn post(&self, body: &Value, accept_sse: bool) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if accept_sse {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(LlmError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(LlmError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "LLM endpoint returned error");
            return Err(LlmError::Api {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }

    /// Issue a streaming request and forward assembled events to a channel.
    ///
    /// The producer reads the SSE byte stream line by line; frames that
    /// fail to parse are dropped silently. The channel gives natural
    /// back-pressure while the consumer awaits tool execution.
    async fn open_stream(
        &self,
        body: Value,
    ) -> Result<mpsc::Receiver<RoundEvent>, LlmError> {
        let response = self.post(&body, true).await?;
        let (tx, rx) = mpsc::channel::<RoundEvent>(64);
        let bridge_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut assembler = StreamAssembler::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(RoundEvent::Error(LlmError::StreamInterrupted(
                                e.to_string(),
                            )))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        for event in assembler.finish() {
                            if tx.send(RoundEvent::from(event)).await.is_err() {
                                return;
                            }
                        }
                        let _ = tx
                            .send(RoundEvent::End {
                                wants_continuation: assembler.wants_continuation(),
                                usage: assembler.usage,
                            })
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(chunk) => {
                            for event in assembler.on_chunk(chunk) {
                                if tx.send(RoundEvent::from(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            trace!(
                                bridge = %bridge_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE].
            for event in assembler.finish() {
                if tx.send(RoundEvent::from(event)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(RoundEvent::End {
                    wants_continuation: assembler.wants_continuation(),
                    usage: assembler.usage,
                })
                .await;
        });

        Ok(rx)
    }

    /// One streaming round of the tool-calling exchange: text accumulates,
    /// calls dispatch the moment they complete.
    async fn stream_round(
        &self,
        conversation: &[ChatMessage],
        dispatcher: &Dispatcher,
        options: &ChatOptions,
    ) -> Result<RoundOutcome, LlmError> {
        let specs = dispatcher.registry().specs();
        let body = self.build_body(conversation, options, Some(&specs), true);
        let rx = self.open_stream(body).await?;
        consume_round(rx, dispatcher).await
    }
}

/// Drain one round's events: accumulate text, dispatch each completed
/// call as it arrives, and stop at the terminal frame. The single
/// consumer preserves stream order; the bounded channel back-pressures
/// the producer while a tool runs.
async fn consume_round(
    mut rx: mpsc::Receiver<RoundEvent>,
    dispatcher: &Dispatcher,
) -> Result<RoundOutcome, LlmError> {
    let mut round = RoundOutcome::default();
    while let Some(event) = rx.recv().await {
        match event {
            RoundEvent::Text(text) => round.content.push_str(&text),
            RoundEvent::Call(call) => {
                debug!(tool = %call.name, call_id = %call.id, "Dispatching streamed tool call");
                let outcome = dispatcher.execute(&call).await;
                round.executed.push(ExecutedTool { call, outcome });
            }
            RoundEvent::End {
                wants_continuation,
                usage,
            } => {
                round.wants_continuation = wants_continuation;
                round.usage = usage;
                break;
            }
            RoundEvent::Error(e) => return Err(e),
        }
    }
    Ok(round)
}

/// Events flowing from the stream producer to the exchange consumer.
enum RoundEvent {
    Text(String),
    Call(clawcraft_core::tool::ToolCall),
    End {
        wants_continuation: bool,
        usage: Option<TokenUsage>,
    },
    Error(LlmError),
}

impl From<StreamEvent> for RoundEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Text(t) => RoundEvent::Text(t),
            StreamEvent::Call(c) => RoundEvent::Call(c),
        }
    }
}

#[derive(Default, Debug)]
struct RoundOutcome {
    content: String,
    executed: Vec<ExecutedTool>,
    wants_continuation: bool,
    usage: Option<TokenUsage>,
}

#[async_trait]
impl LlmBridge for OpenAiCompatBridge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError> {
        let body = self.build_body(messages, options, None, false);
        debug!(bridge = %self.name, model = %self.model, "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_response: ApiResponse = response.json().await.map_err(|e| LlmError::Malformed(
            format!("Failed to parse response: {e}"),
        ))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("No choices in response".into()))?;

        Ok(ChatOutcome {
            content: choice.message.content.unwrap_or_default(),
            executed: Vec::new(),
            usage: api_response.usage.map(Into::into),
        })
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError> {
        let body = self.build_body(messages, options, None, true);
        debug!(bridge = %self.name, model = %self.model, "Sending streaming request");

        let mut events = self.open_stream(body).await?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    RoundEvent::Text(text) => {
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    RoundEvent::Error(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                    RoundEvent::End { .. } => return,
                    // No tools were declared; drop stray calls.
                    RoundEvent::Call(_) => {}
                }
            }
        });

        Ok(rx)
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        dispatcher: &Dispatcher,
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError> {
        let mut conversation = messages.to_vec();
        let mut outcome = ChatOutcome::default();

        for iteration in 1..=self.max_tool_iterations {
            debug!(bridge = %self.name, iteration, "Tool exchange round");
            let round = self.stream_round(&conversation, dispatcher, options).await?;

            outcome.content.push_str(&round.content);
            if round.usage.is_some() {
                outcome.usage = round.usage;
            }

            if round.executed.is_empty() {
                break;
            }

            // Feed the model its own call record plus each tool's output,
            // then let it continue.
            let mut assistant = ChatMessage::assistant(round.content.clone());
            assistant.tool_calls = round
                .executed
                .iter()
                .map(|e| AssistantToolCall {
                    id: e.call.id.clone(),
                    name: e.call.name.clone(),
                    arguments: e.call.arguments.to_string(),
                })
                .collect();
            conversation.push(assistant);

            for executed in &round.executed {
                conversation.push(ChatMessage::tool_result(
                    &executed.call.id,
                    executed.outcome.wire_payload().to_string(),
                ));
            }

            let wants_more = round.wants_continuation;
            outcome.executed.extend(round.executed);

            if !wants_more {
                break;
            }
            if iteration == self.max_tool_iterations {
                warn!(
                    bridge = %self.name,
                    iterations = iteration,
                    "Max tool iterations reached, ending exchange"
                );
            }
        }

        Ok(outcome)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<crate::stream::ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawcraft_core::BotClient;

    #[test]
    fn openrouter_constructor() {
        let bridge = OpenAiCompatBridge::openrouter("sk-test", "anthropic/claude-sonnet-4");
        assert_eq!(bridge.name(), "openrouter");
        assert!(bridge.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let bridge = OpenAiCompatBridge::ollama(None, "llama3");
        assert_eq!(bridge.name(), "ollama");
        assert!(bridge.base_url.contains("localhost:11434"));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            ChatMessage::system("You are a bot"),
            ChatMessage::user("Mine some stone"),
        ];
        let api = OpenAiCompatBridge::to_api_messages(&messages);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut msg = ChatMessage::assistant("on it");
        msg.tool_calls = vec![AssistantToolCall {
            id: "call_1".into(),
            name: "mine_block".into(),
            arguments: r#"{"blockType":"stone"}"#.into(),
        }];
        let api = OpenAiCompatBridge::to_api_messages(&[msg]);
        let tc = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "mine_block");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_result() {
        let msg = ChatMessage::tool_result("call_1", "2 stone mined");
        let api = OpenAiCompatBridge::to_api_messages(&[msg]);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn body_includes_sampling_knobs() {
        let bridge = OpenAiCompatBridge::openai("sk", "gpt-4o-mini");
        let options = ChatOptions {
            temperature: Some(0.3),
            max_tokens: Some(512),
            top_p: Some(0.9),
            response_format: ResponseFormat::JsonObject,
        };
        let body = bridge.build_body(&[ChatMessage::user("hi")], &options, None, false);
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn body_includes_json_schema_format() {
        let bridge = OpenAiCompatBridge::openai("sk", "gpt-4o-mini");
        let options = ChatOptions {
            response_format: ResponseFormat::JsonSchema {
                name: "decision".into(),
                strict: true,
                schema: json!({"type": "object"}),
            },
            ..Default::default()
        };
        let body = bridge.build_body(&[], &options, None, false);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "decision");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn round_executes_calls_in_stream_order() {
        use clawcraft_client::SimClient;
        use clawcraft_core::snapshot::Position;
        use clawcraft_core::tool::{ToolCall, ToolContext};
        use std::sync::Arc;

        // The seed scenario: delta "Thinking…", tool call mine_block,
        // delta " done". The dispatcher must run exactly once, mid-round.
        let client = Arc::new(SimClient::new());
        client.place_block("stone", Position::new(2.0, 64.0, 0.0));
        client.place_block("stone", Position::new(3.0, 64.0, 0.0));
        let dispatcher = Dispatcher::new(
            clawcraft_tools::default_registry(),
            ToolContext::new(client.clone()),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(RoundEvent::Text("Thinking…".into())).await.unwrap();
        tx.send(RoundEvent::Call(ToolCall {
            id: "call_1".into(),
            name: "mine_block".into(),
            arguments: json!({"blockType": "stone", "count": 2}),
        }))
        .await
        .unwrap();
        tx.send(RoundEvent::Text(" done".into())).await.unwrap();
        tx.send(RoundEvent::End {
            wants_continuation: false,
            usage: Some(TokenUsage {
                prompt_tokens: 40,
                completion_tokens: 12,
                total_tokens: 52,
            }),
        })
        .await
        .unwrap();
        drop(tx);

        let round = consume_round(rx, &dispatcher).await.unwrap();
        assert_eq!(round.content, "Thinking… done");
        assert_eq!(round.executed.len(), 1);
        assert_eq!(round.executed[0].call.name, "mine_block");
        assert!(round.executed[0].outcome.success);
        assert_eq!(round.usage.unwrap().total_tokens, 52);

        // The world actually changed: both stone blocks were mined.
        assert!(client.find_blocks(&["stone".into()], 32.0, 10).is_empty());
    }

    #[tokio::test]
    async fn round_surfaces_stream_errors() {
        use clawcraft_client::SimClient;
        use clawcraft_core::tool::ToolContext;
        use std::sync::Arc;

        let dispatcher = Dispatcher::new(
            clawcraft_tools::default_registry(),
            ToolContext::new(Arc::new(SimClient::new())),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(RoundEvent::Text("partial".into())).await.unwrap();
        tx.send(RoundEvent::Error(LlmError::StreamInterrupted(
            "connection reset".into(),
        )))
        .await
        .unwrap();
        drop(tx);

        let err = consume_round(rx, &dispatcher).await.unwrap_err();
        assert!(matches!(err, LlmError::StreamInterrupted(_)));
    }

    #[test]
    fn body_includes_tools_and_stream_options() {
        let bridge = OpenAiCompatBridge::openai("sk", "gpt-4o-mini");
        let registry = clawcraft_tools::default_registry();
        let specs = registry.specs();
        let body = bridge.build_body(&[], &ChatOptions::default(), Some(&specs), true);

        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[0]["type"], "function");
        assert!(tools
            .iter()
            .any(|t| t["function"]["name"] == "mine_block"));
    }
}
