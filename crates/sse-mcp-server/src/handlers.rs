//! JSON-RPC handlers for the MCP methods served over SSE

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use sse_mcp_json_rpc::{JsonRpcHandler, RequestParams, SessionContext};
use sse_mcp_protocol::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, McpError, McpResult,
    ServerCapabilities, methods,
};

use crate::session::SessionRegistry;
use crate::tool::ToolInvoker;

/// Handshake gate for methods that need an initialized session
#[derive(Clone)]
pub struct LifecycleGuard {
    sessions: Arc<SessionRegistry>,
    strict: bool,
}

impl LifecycleGuard {
    pub fn new(sessions: Arc<SessionRegistry>, strict: bool) -> Self {
        Self { sessions, strict }
    }

    /// Always passes in lenient mode.
    pub fn check(&self, method: &str, context: Option<&SessionContext>) -> McpResult<()> {
        if !self.strict {
            return Ok(());
        }

        let session_id = context.map(|ctx| ctx.session_id.as_str()).unwrap_or("unknown");
        let initialized = self
            .sessions
            .get(session_id)
            .is_some_and(|session| session.is_initialized());

        if initialized {
            Ok(())
        } else {
            debug!(
                "Rejecting {} for session {}: handshake not complete",
                method, session_id
            );
            Err(McpError::SessionNotInitialized(session_id.to_string()))
        }
    }
}

/// `initialize`
pub struct InitializeHandler {
    server_info: Implementation,
    capabilities: ServerCapabilities,
}

impl InitializeHandler {
    pub fn new(server_info: Implementation, capabilities: ServerCapabilities) -> Self {
        Self {
            server_info,
            capabilities,
        }
    }
}

#[async_trait]
impl JsonRpcHandler for InitializeHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> McpResult<Value> {
        let requested = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or("unspecified");
        info!(
            "Initialize from session {} (client protocol {})",
            session_context
                .as_ref()
                .map(|ctx| ctx.session_id.as_str())
                .unwrap_or("unknown"),
            requested
        );

        let result = InitializeResult::new(self.server_info.clone(), self.capabilities.clone());
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::INITIALIZE.to_string()]
    }
}

/// `notifications/initialized`: flips the session to initialized
pub struct InitializedNotificationHandler {
    sessions: Arc<SessionRegistry>,
}

impl InitializedNotificationHandler {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    fn mark(&self, session_context: Option<&SessionContext>) {
        let Some(ctx) = session_context else {
            warn!("notifications/initialized received without session context");
            return;
        };
        match self.sessions.get(&ctx.session_id) {
            Some(session) if session.mark_initialized() => {
                info!("Session {} initialized", ctx.session_id);
            }
            Some(_) => {
                debug!(
                    "Session {} already initialized, ignoring duplicate notification",
                    ctx.session_id
                );
            }
            None => warn!(
                "notifications/initialized for unknown session {}",
                ctx.session_id
            ),
        }
    }
}

#[async_trait]
impl JsonRpcHandler for InitializedNotificationHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        _params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> McpResult<Value> {
        self.mark(session_context.as_ref());
        Ok(Value::Null)
    }

    async fn handle_notification(
        &self,
        _method: &str,
        _params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> McpResult<()> {
        self.mark(session_context.as_ref());
        Ok(())
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::INITIALIZED.to_string()]
    }
}

/// `tools/list`
pub struct ToolsListHandler {
    tools: Arc<dyn ToolInvoker>,
    lifecycle: LifecycleGuard,
}

impl ToolsListHandler {
    pub fn new(tools: Arc<dyn ToolInvoker>, lifecycle: LifecycleGuard) -> Self {
        Self { tools, lifecycle }
    }
}

#[async_trait]
impl JsonRpcHandler for ToolsListHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        _params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> McpResult<Value> {
        self.lifecycle.check(method, session_context.as_ref())?;

        let tools = self.tools.list_tools();
        debug!("Listing {} tools", tools.len());
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_LIST.to_string()]
    }
}

/// `tools/call`
pub struct ToolsCallHandler {
    tools: Arc<dyn ToolInvoker>,
    lifecycle: LifecycleGuard,
}

impl ToolsCallHandler {
    pub fn new(tools: Arc<dyn ToolInvoker>, lifecycle: LifecycleGuard) -> Self {
        Self { tools, lifecycle }
    }
}

/// Pull `name` and `arguments` out of `tools/call` params. Missing
/// `arguments` (or `null`) means no arguments.
fn call_params(params: Option<RequestParams>) -> McpResult<(String, Map<String, Value>)> {
    let mut object = match params {
        None => Map::new(),
        Some(RequestParams::Object(map)) => map,
        Some(RequestParams::Array(_)) => {
            return Err(McpError::invalid_params("tools/call params must be an object"));
        }
    };

    let name = match object.remove("name") {
        Some(Value::String(name)) => name,
        Some(_) => return Err(McpError::invalid_params("name must be a string")),
        None => return Err(McpError::missing_param("name")),
    };

    let arguments = match object.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(_) => return Err(McpError::invalid_params("arguments must be an object")),
    };

    Ok((name, arguments))
}

#[async_trait]
impl JsonRpcHandler for ToolsCallHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> McpResult<Value> {
        self.lifecycle.check(method, session_context.as_ref())?;

        let (name, arguments) = call_params(params)?;
        debug!("Calling tool {}", name);

        let text = self
            .tools
            .invoke(&name, arguments, session_context.as_ref())
            .await?;
        Ok(serde_json::to_value(CallToolResult::text(text))?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_CALL.to_string()]
    }
}
