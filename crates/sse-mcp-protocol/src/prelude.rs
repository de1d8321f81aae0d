//! Common re-exports for tool authors.

pub use crate::initialize::{Implementation, InitializeResult, ServerCapabilities, ToolsCapabilities};
pub use crate::schema::JsonSchema;
pub use crate::tools::{CallToolParams, CallToolResult, ContentBlock, ListToolsResult, Tool, ToolSchema};
pub use crate::{MCP_VERSION, McpError, McpResult};
