use crate::error::AgentError;
use crate::state::StateStore;
use crate::types::ToolSchema;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON type of a declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn schema_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Build the JSON Schema object for a parameter list.
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        let mut prop = json!({
            "type": p.param_type.schema_name(),
            "description": p.description,
        });
        if let Some(default) = &p.default {
            prop["default"] = default.clone();
        }
        properties.insert(p.name.clone(), prop);
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check `args` against the declared parameters and fill in defaults.
///
/// `null` is treated as an empty argument object. Unknown keys, missing
/// required parameters, and type mismatches are rejected.
pub fn validate_args(params: &[ParamSpec], args: Value) -> Result<Map<String, Value>, String> {
    let mut args = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(format!("arguments must be an object, got {}", other)),
    };

    if let Some(unknown) = args.keys().find(|k| !params.iter().any(|p| &p.name == *k)) {
        return Err(format!("unknown argument '{}'", unknown));
    }

    for p in params {
        match args.get(&p.name) {
            Some(v) if v.is_null() && !p.required => {
                args.remove(&p.name);
            }
            Some(v) => {
                if !p.param_type.accepts(v) {
                    return Err(format!(
                        "argument '{}' must be of type {}",
                        p.name,
                        p.param_type.schema_name()
                    ));
                }
                continue;
            }
            None if p.required => {
                return Err(format!("missing required argument '{}'", p.name));
            }
            None => {}
        }
        if let Some(default) = &p.default {
            args.insert(p.name.clone(), default.clone());
        }
    }

    Ok(args)
}

/// Outcome of a tool invocation. Serializes to a mapping carrying a
/// `status` field of `"success"` or `"error"`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Map<String, Value>),
    Error { error_message: String },
}

impl ToolResult {
    /// Success carrying a human-readable `report`.
    pub fn success_report(report: impl Into<Value>) -> Self {
        let mut payload = Map::new();
        payload.insert("report".into(), report.into());
        ToolResult::Success(payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult::Error {
            error_message: message.into(),
        }
    }

    /// Add a field to a success payload. No-op on the error variant.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let ToolResult::Success(payload) = &mut self {
            payload.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// `report` field of a success payload.
    pub fn report(&self) -> Option<&Value> {
        match self {
            ToolResult::Success(payload) => payload.get("report"),
            ToolResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Success(_) => None,
            ToolResult::Error { error_message } => Some(error_message),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            ToolResult::Success(payload) => {
                map.insert("status".into(), json!("success"));
                for (k, v) in payload {
                    if k != "status" {
                        map.insert(k.clone(), v.clone());
                    }
                }
            }
            ToolResult::Error { error_message } => {
                map.insert("status".into(), json!("error"));
                map.insert("error_message".into(), json!(error_message));
            }
        }
        Value::Object(map)
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Per-invocation context handed to a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The invoking session's state. `None` for out-of-session calls.
    pub state: Option<StateStore>,
    pub invocation_id: String,
}

impl ToolContext {
    pub fn new(state: StateStore, invocation_id: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            invocation_id: invocation_id.into(),
        }
    }

    pub fn stateless() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&StateStore> {
        self.state.as_ref()
    }
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in function calling).
    fn name(&self) -> &str;

    /// Human-readable description the model uses to judge relevance.
    fn description(&self) -> &str;

    /// Declared parameters, validated before `execute` is called.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Execute the tool with validated arguments (defaults already applied).
    ///
    /// An `Err` is converted to [`ToolResult::Error`] by the registry.
    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult, AgentError>;
}

/// Ordered, fixed set of tools available to an agent.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Upper bound applied to every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        tracing::debug!("Registered tool: {}", name);
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Registered tool names, in registration order.
    pub fn list_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function declarations for all registered tools, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: parameters_schema(&t.parameters()),
            })
            .collect()
    }

    /// Invoke a tool by name. Never fails: every fault, including a panic
    /// or a timeout inside the tool, comes back as [`ToolResult::Error`].
    pub async fn invoke(&self, tool_name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(tool_name) else {
            tracing::warn!(tool = tool_name, "model requested unknown tool");
            return ToolResult::error(AgentError::ToolNotFound(tool_name.to_string()).to_string());
        };

        let args = match validate_args(&tool.parameters(), args) {
            Ok(args) => args,
            Err(message) => {
                let err = AgentError::InvalidArguments {
                    tool_name: tool_name.to_string(),
                    message,
                };
                tracing::warn!(tool = tool_name, "{}", err);
                return ToolResult::error(err.to_string());
            }
        };

        let call = AssertUnwindSafe(tool.execute(args, ctx)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                tracing::warn!(tool = tool_name, "tool failed: {}", e);
                ToolResult::error(e.to_string())
            }
            Ok(Err(panic)) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(tool = tool_name, "tool panicked: {}", detail);
                ToolResult::error(format!("{} failed unexpectedly: {}", tool_name, detail))
            }
            Err(_) => {
                let err = AgentError::Timeout(self.timeout.as_secs());
                tracing::warn!(tool = tool_name, "{}", err);
                ToolResult::error(format!("{}: {}", tool_name, err))
            }
        }
    }

    /// Number of registered tools.
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
