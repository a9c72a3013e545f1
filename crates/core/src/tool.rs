//! Tool declarations, validation, and dispatch.
//!
//! Tools are what give the agent the ability to act in the world: read
//! vitals, mine, craft, navigate, eat. Each tool declares its parameter
//! schema; validation and argument binding are driven from that schema,
//! so handlers receive typed, already-validated arguments.
//!
//! The dispatcher never lets a handler fault cross the boundary —
//! internal errors are normalized into a failed `ToolOutcome`.

use crate::bot::BotClient;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A request from the model to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (from the model, or synthesized by the bridge).
    pub id: String,

    /// Name of the tool to execute.
    pub name: String,

    /// Arguments as a JSON object.
    pub arguments: Value,
}

/// The normalized result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    /// Human-readable description of what happened.
    pub message: String,

    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error string when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            data: None,
            error: Some(error),
        }
    }

    /// The payload sent back to the model as the tool's response:
    /// structured data when present, else the message, else the bare
    /// success flag.
    pub fn wire_payload(&self) -> Value {
        if !self.success {
            return json!({
                "success": false,
                "error": self.error.clone().unwrap_or_else(|| self.message.clone()),
            });
        }
        if let Some(data) = &self.data {
            return data.clone();
        }
        if !self.message.is_empty() {
            return json!(self.message);
        }
        json!({ "success": self.success })
    }
}

/// Parameter value types a tool schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn json_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Declaration of a single tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required,
            enum_values: None,
            minimum: None,
            maximum: None,
            default: None,
        }
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// A tool declaration: the source of truth sent to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Render the declaration as a JSON Schema object for the wire.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for p in &self.params {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), json!(p.param_type.json_name()));
            prop.insert("description".into(), json!(p.description));
            if let Some(values) = &p.enum_values {
                prop.insert("enum".into(), json!(values));
            }
            if let Some(min) = p.minimum {
                prop.insert("minimum".into(), json!(min));
            }
            if let Some(max) = p.maximum {
                prop.insert("maximum".into(), json!(max));
            }
            if let Some(default) = &p.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(p.name.clone(), Value::Object(prop));
            if p.required {
                required.push(p.name.clone());
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate and bind arguments against this schema.
    ///
    /// Missing optional parameters receive their declared defaults; the
    /// returned object is what the handler sees.
    pub fn bind_arguments(&self, arguments: &Value) -> Result<Value, ToolError> {
        let mut bound = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Arguments must be an object, got {other}"
                )))
            }
        };

        for p in &self.params {
            match bound.get(&p.name) {
                None => {
                    if let Some(default) = &p.default {
                        bound.insert(p.name.clone(), default.clone());
                    } else if p.required {
                        return Err(ToolError::InvalidArguments(format!(
                            "Missing required parameter '{}'",
                            p.name
                        )));
                    }
                }
                Some(value) => {
                    if !p.param_type.matches(value) {
                        return Err(ToolError::InvalidArguments(format!(
                            "Parameter '{}' must be of type {}",
                            p.name,
                            p.param_type.json_name()
                        )));
                    }
                    if let Some(values) = &p.enum_values {
                        let s = value.as_str().unwrap_or_default();
                        if !values.iter().any(|v| v == s) {
                            return Err(ToolError::InvalidArguments(format!(
                                "Parameter '{}' must be one of {:?}",
                                p.name, values
                            )));
                        }
                    }
                    if let Some(n) = value.as_f64() {
                        if let Some(min) = p.minimum {
                            if n < min {
                                return Err(ToolError::InvalidArguments(format!(
                                    "Parameter '{}' must be >= {min}",
                                    p.name
                                )));
                            }
                        }
                        if let Some(max) = p.maximum {
                            if n > max {
                                return Err(ToolError::InvalidArguments(format!(
                                    "Parameter '{}' must be <= {max}",
                                    p.name
                                )));
                            }
                        }
                    }
                }
            }
        }

        Ok(Value::Object(bound))
    }
}

/// Execution context handed to every tool handler.
///
/// Handlers are strictly actors on the bot: the context carries the game
/// client handle and nothing of the planning layer.
#[derive(Clone)]
pub struct ToolContext {
    pub client: Arc<dyn BotClient>,
}

impl ToolContext {
    pub fn new(client: Arc<dyn BotClient>) -> Self {
        Self { client }
    }
}

/// The core Tool trait.
///
/// Each tool (get_position, mine_block, craft_item, ...) implements this
/// trait. Tools are registered in the `ToolRegistry` and made available
/// to the LLM through their declarations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "mine_block").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Parameter declarations for this tool.
    fn params(&self) -> Vec<ParamSpec>;

    /// Execute the tool with already-validated, bound arguments.
    async fn run(&self, arguments: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;

    /// Assemble the full declaration.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            params: self.params(),
        }
    }
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool declarations (for sending to the LLM), sorted by name so
    /// the context is stable across cycles.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates and executes tool calls, normalizing every failure into a
/// `ToolOutcome`.
pub struct Dispatcher {
    registry: ToolRegistry,
    context: ToolContext,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Check that a call is well-formed and resolves in the registry.
    pub fn validate(&self, call: &ToolCall) -> Result<(), ToolError> {
        if call.id.is_empty() {
            return Err(ToolError::MissingCallId);
        }
        if call.name.is_empty() {
            return Err(ToolError::MissingName);
        }
        if self.registry.get(&call.name).is_none() {
            return Err(ToolError::UnknownTool(call.name.clone()));
        }
        Ok(())
    }

    /// Validate, bind arguments, and run the handler. Never returns an
    /// error: faults become `{success: false, error}` outcomes.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        if let Err(e) = self.validate(call) {
            warn!(tool = %call.name, error = %e, "Tool call rejected");
            return ToolOutcome::fail(e.to_string());
        }

        let Some(tool) = self.registry.get(&call.name) else {
            return ToolOutcome::fail(ToolError::UnknownTool(call.name.clone()).to_string());
        };

        let bound = match tool.spec().bind_arguments(&call.arguments) {
            Ok(bound) => bound,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool arguments rejected");
                return ToolOutcome::fail(e.to_string());
            }
        };

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");

        match tool.run(bound, &self.context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolOutcome::fail(e.to_string())
            }
        }
    }

    /// Execute calls sequentially; never short-circuits on failure and
    /// returns exactly one outcome per call, in order.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute(call).await);
        }
        outcomes
    }
}
