//! SSE stream assembly.
//!
//! Turns parsed `data:` frames into an ordered event sequence: text
//! deltas, completed tool calls, and the terminal frame. Tool-call
//! arguments arrive as string fragments keyed by index; a call is
//! considered complete as soon as the stream moves past it (a delta for
//! a different index, a content delta, or stream end), which is what
//! lets the consumer execute it while the response is still arriving.

use chrono::Utc;
use clawcraft_core::message::TokenUsage;
use clawcraft_core::tool::ToolCall;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(u: ApiUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// An ordered event assembled from the stream.
#[derive(Debug)]
pub(crate) enum StreamEvent {
    /// A text fragment.
    Text(String),
    /// A completed tool call, ready to dispatch.
    Call(ToolCall),
}

/// Accumulates incremental tool call deltas into complete calls.
#[derive(Default)]
struct CallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl CallAccumulator {
    fn into_call(self, synth_seq: &mut u32) -> ToolCall {
        // Synthesize a stable id when the model did not provide one.
        let id = if self.id.is_empty() {
            *synth_seq += 1;
            format!("call_{}_{}", Utc::now().timestamp_millis(), synth_seq)
        } else {
            self.id
        };
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or(Value::Object(serde_json::Map::new()))
        };
        ToolCall {
            id,
            name: self.name,
            arguments,
        }
    }
}

/// Assembles parsed frames into ordered `StreamEvent`s.
#[derive(Default)]
pub(crate) struct StreamAssembler {
    accumulators: BTreeMap<u32, CallAccumulator>,
    active_index: Option<u32>,
    synth_seq: u32,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one parsed frame; returns the events it completes, in order.
    pub fn on_chunk(&mut self, chunk: StreamResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(tool_deltas) = choice.delta.tool_calls {
                for delta in tool_deltas {
                    // Moving to a new index completes the previous call.
                    if let Some(active) = self.active_index {
                        if active != delta.index {
                            events.extend(self.flush_index(active));
                        }
                    }
                    self.active_index = Some(delta.index);

                    let acc = self.accumulators.entry(delta.index).or_default();
                    if let Some(id) = delta.id {
                        acc.id = id;
                    }
                    if let Some(function) = delta.function {
                        if let Some(name) = function.name {
                            acc.name = name;
                        }
                        if let Some(arguments) = function.arguments {
                            acc.arguments.push_str(&arguments);
                        }
                    }
                }
            }

            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    // The model moved on to text: any pending call is done.
                    events.extend(self.flush_all());
                    events.push(StreamEvent::Text(content));
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.extend(self.flush_all());
                self.finish_reason = Some(reason);
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        events
    }

    /// Complete any remaining calls (stream ended).
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.flush_all()
    }

    fn flush_index(&mut self, index: u32) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(acc) = self.accumulators.remove(&index) {
            if !acc.name.is_empty() {
                events.push(StreamEvent::Call(acc.into_call(&mut self.synth_seq)));
            }
        }
        events
    }

    fn flush_all(&mut self) -> Vec<StreamEvent> {
        self.active_index = None;
        let indices: Vec<u32> = self.accumulators.keys().copied().collect();
        indices
            .into_iter()
            .flat_map(|i| self.flush_index(i))
            .collect()
    }

    /// Whether the model ended the round asking for tool results.
    pub fn wants_continuation(&self) -> bool {
        self.finish_reason.as_deref() == Some("tool_calls")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(data: &str) -> StreamResponse {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn parse_content_delta() {
        let chunk = parse(r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#);
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_tool_call_delta() {
        let chunk = parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"mine_block","arguments":""}}]},"finish_reason":null}]}"#,
        );
        let tc = &chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.index, 0);
        assert_eq!(tc.id.as_deref(), Some("call_abc"));
    }

    #[test]
    fn parse_usage_chunk() {
        let chunk = parse(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        let usage: TokenUsage = chunk.usage.unwrap().into();
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn text_then_call_then_text_in_order() {
        // The seed scenario: delta "Thinking…", a tool call, delta " done".
        let mut asm = StreamAssembler::new();
        let mut events = Vec::new();

        events.extend(asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"content":"Thinking…"},"finish_reason":null}]}"#,
        )));
        events.extend(asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"mine_block","arguments":"{\"blockType\":\"stone\",\"count\":2}"}}]},"finish_reason":null}]}"#,
        )));
        events.extend(asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"content":" done"},"finish_reason":null}]}"#,
        )));
        events.extend(asm.finish());

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Text(t) if t == "Thinking…"));
        match &events[1] {
            StreamEvent::Call(call) => {
                assert_eq!(call.name, "mine_block");
                assert_eq!(call.arguments, json!({"blockType": "stone", "count": 2}));
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert!(matches!(&events[2], StreamEvent::Text(t) if t == " done"));
    }

    #[test]
    fn arguments_accumulate_across_chunks() {
        let mut asm = StreamAssembler::new();
        asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"craft_item","arguments":"{\"itemName\""}}]},"finish_reason":null}]}"#,
        ));
        asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"stick\"}"}}]},"finish_reason":null}]}"#,
        ));
        let events = asm.finish();

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Call(call) => {
                assert_eq!(call.id, "call_9");
                assert_eq!(call.arguments, json!({"itemName": "stick"}));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn second_index_completes_first_call() {
        let mut asm = StreamAssembler::new();
        let first = asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"get_health","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ));
        assert!(first.is_empty());

        let second = asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"get_position","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ));
        assert_eq!(second.len(), 1);
        assert!(matches!(&second[0], StreamEvent::Call(c) if c.name == "get_health"));

        let rest = asm.finish();
        assert_eq!(rest.len(), 1);
        assert!(matches!(&rest[0], StreamEvent::Call(c) if c.name == "get_position"));
    }

    #[test]
    fn finish_reason_flushes_and_records() {
        let mut asm = StreamAssembler::new();
        asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"eat_food","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ));
        let events = asm.on_chunk(parse(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
        ));
        assert_eq!(events.len(), 1);
        assert!(asm.wants_continuation());
    }

    #[test]
    fn missing_id_gets_synthesized() {
        let mut asm = StreamAssembler::new();
        asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"get_health","arguments":"{}"}}]},"finish_reason":null}]}"#,
        ));
        let events = asm.finish();
        match &events[0] {
            StreamEvent::Call(call) => {
                assert!(call.id.starts_with("call_"));
                assert!(!call.id.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn malformed_arguments_become_empty_object() {
        let mut asm = StreamAssembler::new();
        asm.on_chunk(parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"x","function":{"name":"get_health","arguments":"{broken"}}]},"finish_reason":null}]}"#,
        ));
        let events = asm.finish();
        match &events[0] {
            StreamEvent::Call(call) => assert_eq!(call.arguments, json!({})),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn empty_delta_produces_nothing() {
        let mut asm = StreamAssembler::new();
        let events = asm.on_chunk(parse(r#"{"choices":[{"delta":{},"finish_reason":null}]}"#));
        assert!(events.is_empty());
        assert!(asm.finish().is_empty());
    }
}
