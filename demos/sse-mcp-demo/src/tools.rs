//! Demo tools

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use sse_mcp_server::prelude::*;

fn string_arg<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Greets the caller
pub struct HelloWorldTool;

#[async_trait]
impl McpTool for HelloWorldTool {
    fn name(&self) -> &str {
        "hello_world"
    }

    fn description(&self) -> &str {
        "Returns a Hello World message"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object().with_property(
            "name",
            JsonSchema::string().with_description("Name to greet (optional)"),
        )
    }

    async fn call(
        &self,
        arguments: Map<String, Value>,
        _session: Option<&SessionContext>,
    ) -> McpResult<String> {
        let name = string_arg(&arguments, "name").unwrap_or("World");
        Ok(format!("Hello, {}!", name))
    }
}

/// Reports local server time
pub struct GetTimeTool;

#[async_trait]
impl McpTool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Returns current server time"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object()
    }

    async fn call(
        &self,
        _arguments: Map<String, Value>,
        session: Option<&SessionContext>,
    ) -> McpResult<String> {
        if let Some(session) = session {
            debug!("get_time for session {}", session.session_id);
        }
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        Ok(format!("Current server time: {}", now))
    }
}

pub struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object().with_property(
            "message",
            JsonSchema::string().with_description("Message to echo back"),
        )
    }

    async fn call(
        &self,
        arguments: Map<String, Value>,
        _session: Option<&SessionContext>,
    ) -> McpResult<String> {
        let message = string_arg(&arguments, "message").unwrap_or("(empty message)");
        Ok(format!("Echo: {}", message))
    }
}
