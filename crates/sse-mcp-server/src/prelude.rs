//! Prelude module for common SSE MCP server imports
//!
//! ```rust
//! use sse_mcp_server::prelude::*;
//! ```

pub use sse_mcp_protocol::prelude::*;

pub use sse_mcp_json_rpc::SessionContext;

pub use crate::config::{DEFAULT_ALLOWED_ORIGINS, OverflowPolicy, ServerConfig, StreamConfig};
pub use crate::server::{ServerStats, SseMcpServer, SseMcpServerBuilder};
pub use crate::tool::McpTool;
pub use crate::{HttpMcpError, Result};
