//! # JSON-RPC 2.0 Envelopes
//!
//! Transport-agnostic JSON-RPC 2.0 types used by the SSE MCP server:
//! requests, notifications, responses and error objects, a decoder for
//! inbound envelopes and an async method dispatcher.
//!
//! ## Wire rules
//! - `result` and `error` are mutually exclusive on a response
//! - absent fields are omitted, never serialized as `null`
//! - a missing `jsonrpc` tag is read as `"2.0"`; any other value is rejected

pub mod dispatch;
pub mod error;
pub mod notification;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

#[cfg(feature = "async")]
pub mod r#async;

pub use dispatch::{JsonRpcIncoming, parse_json_rpc_message};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
