//! # MCP Protocol Types
//!
//! The subset of the Model Context Protocol (version `2024-11-05`) spoken by
//! the SSE server: the initialize handshake, tool listing and tool calls,
//! plus the error type shared by every handler.

pub mod initialize;
pub mod prelude;
pub mod schema;
pub mod tools;

pub use initialize::{Implementation, InitializeResult, ServerCapabilities, ToolsCapabilities};
pub use schema::JsonSchema;
pub use tools::{CallToolParams, CallToolResult, ContentBlock, ListToolsResult, Tool, ToolSchema};

use sse_mcp_json_rpc::error::JsonRpcErrorObject;

/// The protocol version echoed back from `initialize`
pub const MCP_VERSION: &str = "2024-11-05";

/// Method names routed by the dispatcher
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

pub type McpResult<T> = Result<T, McpError>;

/// MCP-level errors raised by handlers and tools
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Session not initialized: {0}")]
    SessionNotInitialized(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<String> for McpError {
    fn from(message: String) -> Self {
        Self::ToolExecutionError(message)
    }
}

impl From<&str> for McpError {
    fn from(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }
}

impl McpError {
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::InvalidParameters(message.to_string())
    }

    pub fn tool_execution(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }

    pub fn configuration(message: &str) -> Self {
        Self::ConfigurationError(message.to_string())
    }

    /// The JSON-RPC error object sent back for this error.
    ///
    /// Parameter problems are `invalid params`, a call made before the
    /// handshake is an `invalid request`, and everything else, including
    /// unknown tools and failed tool runs, is an `internal error` carrying
    /// the error text.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::InvalidParameters(msg) => JsonRpcErrorObject::invalid_params(msg),
            McpError::MissingParameter(param) => JsonRpcErrorObject::invalid_params(&format!(
                "Missing required parameter: {}",
                param
            )),
            McpError::SessionNotInitialized(_) => {
                JsonRpcErrorObject::invalid_request(Some(self.to_string()))
            }
            McpError::ToolNotFound(_)
            | McpError::ToolExecutionError(_)
            | McpError::ConfigurationError(_)
            | McpError::SerializationError(_) => {
                JsonRpcErrorObject::internal_error(Some(self.to_string()))
            }
        }
    }
}

impl sse_mcp_json_rpc::r#async::ToJsonRpcError for McpError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        McpError::to_error_object(self)
    }
}
