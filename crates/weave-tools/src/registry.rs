// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use weave_model::{ToolCall, ToolDefinition};

use crate::tool::{Tool, ToolCtx};

/// Immutable, name-keyed set of callable tools. Built once at agent
/// construction and shared across turns and (for the Telegram dispatcher)
/// across concurrently-served chats.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Tool schemas in the shape the model provider advertises to the model.
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Execute a model-requested tool call, returning the text to send back
    /// as the tool-result message. Unknown tools and execution failures are
    /// both turned into an error-shaped result string rather than propagated
    /// as a hard error — the agent loop always gets a turn to continue, and
    /// the model sees its own mistake in the transcript.
    pub async fn execute(&self, ctx: &ToolCtx, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            return "Error: tool not found".to_string();
        };
        let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => return format!("Error executing tool {}: invalid arguments JSON: {e}", call.name),
        };
        match tool.execute(ctx, args).await {
            Ok(result) => result,
            Err(e) => format!("Error executing tool {}: {e}", call.name),
        }
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
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::RwLock;
    use weave_config::Config;
    use weave_memory::VectorStore;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": { "text": { "type": "string" } } })
        }
        async fn execute(&self, _ctx: &ToolCtx, args: Value) -> Result<String, crate::tool::ToolError> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    fn test_ctx() -> ToolCtx {
        ToolCtx::new(
            Arc::new(Config::default()),
            Arc::new(RwLock::new(VectorStore::load("/tmp/weave-tools-test-unused.json").unwrap())),
        )
    }

    #[tokio::test]
    async fn execute_dispatches_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let call = ToolCall { id: "1".into(), name: "echo".into(), arguments: r#"{"text":"hi"}"#.into() };
        let result = registry.execute(&test_ctx(), &call).await;
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error_text_not_panic() {
        let registry = ToolRegistry::new();
        let call = ToolCall { id: "1".into(), name: "does_not_exist".into(), arguments: "{}".into() };
        let result = registry.execute(&test_ctx(), &call).await;
        assert!(result.contains("tool not found"));
    }

    #[tokio::test]
    async fn execute_invalid_json_arguments_returns_error_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let call = ToolCall { id: "1".into(), name: "echo".into(), arguments: "not json".into() };
        let result = registry.execute(&test_ctx(), &call).await;
        assert!(result.contains("invalid arguments"));
    }

    #[test]
    fn schemas_reflects_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }
}
