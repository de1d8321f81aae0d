//! MCP Tool Trait
//!
//! Tools are the capabilities a client can list and call. Each tool
//! describes itself and implements a single `call`; the [`ToolRegistry`]
//! keeps them in registration order and is what the dispatcher talks to
//! through [`ToolInvoker`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use sse_mcp_json_rpc::SessionContext;
use sse_mcp_protocol::{McpError, McpResult, Tool, ToolSchema};

/// A callable capability
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> ToolSchema;

    /// Run the tool. The returned text becomes a single text content item.
    async fn call(
        &self,
        arguments: Map<String, Value>,
        session: Option<&SessionContext>,
    ) -> McpResult<String>;

    fn descriptor(&self) -> Tool {
        Tool::new(self.name(), self.description(), self.input_schema())
    }
}

/// What the dispatcher needs from the set of tools
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Descriptors in registration order
    fn list_tools(&self) -> Vec<Tool>;

    /// Call a tool by name. Fails with [`McpError::ToolNotFound`] for unknown
    /// names and [`McpError::ToolExecutionError`] when the tool fails.
    async fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        session: Option<&SessionContext>,
    ) -> McpResult<String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn McpTool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names are unique.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) -> McpResult<()> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(McpError::configuration(&format!(
                "Duplicate tool name: {}",
                name
            )));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn McpTool>> {
        self.by_name
            .get(name)
            .and_then(|&index| self.tools.get(index))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.descriptor()).collect()
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        session: Option<&SessionContext>,
    ) -> McpResult<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        debug!("Invoking tool {} with {} arguments", name, arguments.len());

        match tool.call(arguments, session).await {
            Ok(text) => Ok(text),
            Err(err @ McpError::ToolExecutionError(_)) => Err(err),
            Err(err @ (McpError::InvalidParameters(_) | McpError::MissingParameter(_))) => Err(err),
            Err(other) => Err(McpError::ToolExecutionError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse_mcp_protocol::JsonSchema;

    struct Upper;

    #[async_trait]
    impl McpTool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercases text"
        }

        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
                .with_property("text", JsonSchema::string())
                .with_required(vec!["text".to_string()])
        }

        async fn call(
            &self,
            arguments: Map<String, Value>,
            _session: Option<&SessionContext>,
        ) -> McpResult<String> {
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| McpError::missing_param("text"))?;
            Ok(text.to_uppercase())
        }
    }

    struct Broken;

    #[async_trait]
    impl McpTool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
        }

        async fn call(
            &self,
            _arguments: Map<String, Value>,
            _session: Option<&SessionContext>,
        ) -> McpResult<String> {
            Err(McpError::configuration("backend unavailable"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper)).unwrap();
        registry.register(Arc::new(Broken)).unwrap();
        registry
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let names: Vec<String> = registry().list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["upper", "broken"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(Arc::new(Upper)),
            Err(McpError::ConfigurationError(_))
        ));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_invoke() {
        let mut arguments = Map::new();
        arguments.insert("text".to_string(), Value::from("hi"));
        let result = registry().invoke("upper", arguments, None).await.unwrap();
        assert_eq!(result, "HI");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = registry().invoke("bogus", Map::new(), None).await;
        assert!(matches!(result, Err(McpError::ToolNotFound(name)) if name == "bogus"));
    }

    #[tokio::test]
    async fn test_tool_failures_become_execution_errors() {
        let result = registry().invoke("broken", Map::new(), None).await;
        assert!(matches!(result, Err(McpError::ToolExecutionError(msg)) if msg.contains("backend unavailable")));

        let result = registry().invoke("upper", Map::new(), None).await;
        assert!(matches!(result, Err(McpError::MissingParameter(_))));
    }
}
