//! # SSE MCP Server
//!
//! Model Context Protocol server over the HTTP+SSE dual-channel transport
//! (protocol version 2024-11-05).
//!
//! A client opens a long-lived `GET /sse` push stream. The first event it
//! receives is `endpoint`, carrying the URI to `POST` JSON-RPC requests to.
//! Responses are never written to the POST; they are delivered as `message`
//! events on the push stream of the same session.
//!
//! ## Features
//! - Per-session outbound channel with bounded buffering and keepalive pings
//! - `initialize` / `notifications/initialized` handshake, optionally enforced
//! - Static tool registry served through `tools/list` and `tools/call`
//! - `Origin` allow-list and CORS headers on both legs

pub mod channel;
pub mod config;
pub mod cors;
pub mod dispatch;
pub mod handlers;
pub mod origin;
pub mod prelude;
pub mod server;
pub mod session;
pub mod tool;
pub mod transport;

// Re-export main types
pub use channel::{ChannelError, OutboundChannel, SseEvent};
pub use config::{OverflowPolicy, ServerConfig, StreamConfig};
pub use cors::CorsLayer;
pub use dispatch::McpDispatcher;
pub use origin::OriginValidator;
pub use server::{ServerStats, SseMcpServer, SseMcpServerBuilder};
pub use session::{Session, SessionError, SessionRegistry};
pub use tool::{McpTool, ToolInvoker, ToolRegistry};
pub use transport::{McpBody, SseTransport};

// Re-export foundational types
pub use sse_mcp_json_rpc::{JsonRpcDispatcher, JsonRpcHandler, SessionContext};
pub use sse_mcp_protocol::*;

/// Result type for SSE MCP server operations
pub type Result<T> = std::result::Result<T, HttpMcpError>;

/// SSE MCP server errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] sse_mcp_json_rpc::JsonRpcError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] sse_mcp_protocol::McpError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}
