//! Common re-exports.
//!
//! ```rust
//! use sse_mcp_json_rpc::prelude::*;
//! ```

pub use crate::dispatch::{JsonRpcIncoming, parse_json_rpc_message};
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use crate::types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use crate::r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};

pub use crate::error_codes::*;
