//! Tool trait and registry.
//!
//! The model never calls collaborators directly: it issues a
//! [`ToolCallRequest`](crate::openai::ToolCallRequest) which the registry
//! resolves by name and executes. Results go back to the model as plain
//! strings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::openai::{ToolCallRequest, ToolSpec};

/// An external collaborator the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registered name the model refers to
    fn name(&self) -> &str;
    /// Human-readable description advertised in the tool schema
    fn description(&self) -> &str;
    /// JSON schema of the tool's parameters
    fn parameters(&self) -> Value;
    /// Executes the tool with its decoded input string.
    async fn call(&self, input: &str) -> Result<String, AgentError>;
}

/// Name-keyed set of registered tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its own name, replacing any previous entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas for every registered tool, for inclusion in a request.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    /// Resolves and executes the tool a model reply asked for.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] when no tool is registered under
    /// the requested name; tool execution errors propagate unchanged.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<String, AgentError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

        let input = decode_tool_input(&call.arguments);
        tracing::debug!(tool = %call.name, input = %input, "dispatching tool invocation");
        tool.call(&input).await
    }
}

/// Decodes the model's raw arguments string into the single input string
/// tools take.
///
/// Accepts `{"input": "..."}` objects (falling back to the first string
/// value for models that invent their own key), bare JSON strings, and raw
/// unquoted text.
fn decode_tool_input(arguments: &str) -> String {
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => map
            .get("input")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                map.values()
                    .find_map(|value| value.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| arguments.trim().to_string()),
        Ok(Value::String(s)) => s,
        _ => arguments.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {"input": {"type": "string"}},
                "required": ["input"]
            })
        }

        async fn call(&self, input: &str) -> Result<String, AgentError> {
            Ok(format!("echo:{input}"))
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_decodes_input_object() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry
            .dispatch(&call("echo", r#"{"input": "2024-10"}"#))
            .await
            .unwrap();
        assert_eq!(result, "echo:2024-10");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch(&call("nope", "{}")).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[test]
    fn test_decode_tool_input_variants() {
        assert_eq!(decode_tool_input(r#"{"input": "2024-10"}"#), "2024-10");
        assert_eq!(decode_tool_input(r#"{"query": "2024-10"}"#), "2024-10");
        assert_eq!(decode_tool_input(r#""2024-10""#), "2024-10");
        assert_eq!(decode_tool_input("2024-10"), "2024-10");
    }

    #[test]
    fn test_specs_advertise_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        let json = serde_json::to_value(&specs[0]).unwrap();
        assert_eq!(json["function"]["name"], "echo");
    }
}
