//! Tool trait — the contract for the agent's three operations.
//!
//! Tools are the fixed capabilities of the planner: fetch the day's calendar,
//! search and score learning resources, send the SMS notification. The model
//! requests them by name; the registry validates the arguments, dispatches,
//! and applies the retry policy uniformly so no adapter reimplements backoff.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::collections::HashMap;

/// A request to execute a tool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    /// Correlation ID (matches the model's tool call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (fed back to the model verbatim)
    pub output: String,

    /// Optional structured data (consumed by the loop's plan accumulator)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The core Tool trait.
///
/// Each adapter (calendar, search, notify) implements this trait and is
/// registered in the ToolRegistry, which the loop dispatches through.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "fetch_calendar").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value)
    -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Check model-supplied arguments against a tool's parameter schema: every
/// `required` key must be present, and declared property types must match
/// coarsely. A failure here is a validation error fed back to the model,
/// never a crash.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> std::result::Result<(), ToolError> {
    let args = arguments
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments("arguments must be a JSON object".into()))?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !args.contains_key(key) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required argument '{key}'"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in args {
            let Some(expected) = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str())
            else {
                continue;
            };
            let ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !ok {
                return Err(ToolError::InvalidArguments(format!(
                    "argument '{key}' must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

/// A registry of the planner's tools.
///
/// The loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Validate, dispatch, and retry tool calls the model requests
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    retry: RetryPolicy,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy applied to every dispatched call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate and execute a tool call, retrying transient failures with
    /// the registry's backoff policy. Terminal and validation errors surface
    /// without retry.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        validate_arguments(&tool.parameters_schema(), &call.arguments)?;

        let mut result = self
            .retry
            .run(
                &call.name,
                ToolError::is_retryable,
                || tool.execute(call.arguments.clone()),
            )
            .await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// A simple echo tool for registry tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "count": { "type": "integer" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: text,
                data: None,
            })
        }
    }

    /// Fails with a retryable error a fixed number of times, then succeeds.
    struct FlakyTool {
        failures: AtomicU32,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Transiently failing tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            })
            .is_ok()
            {
                return Err(ToolError::Timeout {
                    tool_name: "flaky".into(),
                    timeout_secs: 30,
                });
            }
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: "recovered".into(),
                data: None,
            })
        }
    }

    fn fast_registry() -> ToolRegistry {
        ToolRegistry::new().with_retry(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ))
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FlakyTool {
            failures: AtomicU32::new(0),
        }));
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "flaky");
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = fast_registry();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute(&call("echo", serde_json::json!({"text": "hello"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn unknown_tool_is_structured_error() {
        let registry = fast_registry();
        let err = registry
            .execute(&call("bogus", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn missing_required_argument_rejected_before_dispatch() {
        let mut registry = fast_registry();
        registry.register(Box::new(EchoTool));
        let err = registry
            .execute(&call("echo", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("text"));
    }

    #[tokio::test]
    async fn wrong_argument_type_rejected() {
        let mut registry = fast_registry();
        registry.register(Box::new(EchoTool));
        let err = registry
            .execute(&call("echo", serde_json::json!({"text": "hi", "count": "three"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let mut registry = fast_registry();
        registry.register(Box::new(EchoTool));
        let err = registry
            .execute(&call("echo", serde_json::json!([1, 2, 3])))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let mut registry = fast_registry();
        registry.register(Box::new(FlakyTool {
            failures: AtomicU32::new(2),
        }));
        let result = registry
            .execute(&call("flaky", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(result.output, "recovered");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let mut registry = fast_registry();
        registry.register(Box::new(FlakyTool {
            failures: AtomicU32::new(10),
        }));
        let err = registry
            .execute(&call("flaky", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
