//! MCP request dispatcher
//!
//! Routes decoded envelopes to the method handlers. The dispatcher holds no
//! per-session state; the handshake flag lives on the [`Session`] and is
//! reached through the registry.

use std::sync::Arc;

use tracing::{debug, warn};

use sse_mcp_json_rpc::{
    JsonRpcDispatcher, JsonRpcIncoming, JsonRpcMessage, JsonRpcNotification, SessionContext,
};
use sse_mcp_protocol::{Implementation, McpError, ServerCapabilities, methods};

use crate::handlers::{
    InitializeHandler, InitializedNotificationHandler, LifecycleGuard, ToolsCallHandler,
    ToolsListHandler,
};
use crate::session::{Session, SessionRegistry};
use crate::tool::ToolInvoker;

pub struct McpDispatcher {
    inner: JsonRpcDispatcher<McpError>,
}

impl McpDispatcher {
    pub fn new(
        server_info: Implementation,
        tools: Arc<dyn ToolInvoker>,
        sessions: Arc<SessionRegistry>,
        strict_lifecycle: bool,
    ) -> Self {
        let lifecycle = LifecycleGuard::new(Arc::clone(&sessions), strict_lifecycle);

        let mut inner = JsonRpcDispatcher::new();
        inner.register_method(
            methods::INITIALIZE,
            InitializeHandler::new(server_info, ServerCapabilities::with_static_tools()),
        );
        inner.register_method(
            methods::INITIALIZED,
            InitializedNotificationHandler::new(sessions),
        );
        inner.register_method(
            methods::TOOLS_LIST,
            ToolsListHandler::new(Arc::clone(&tools), lifecycle.clone()),
        );
        inner.register_method(methods::TOOLS_CALL, ToolsCallHandler::new(tools, lifecycle));

        Self { inner }
    }

    /// Handle one envelope for `session`. Returns the response to publish,
    /// or `None` for notifications.
    pub async fn dispatch(
        &self,
        session: &Session,
        incoming: JsonRpcIncoming,
    ) -> Option<JsonRpcMessage> {
        let context = session_context(session);

        match incoming {
            JsonRpcIncoming::Notification(notification) => {
                self.notify(notification, context).await;
                None
            }
            // Handshake completion is never answered, even when sent with an id.
            JsonRpcIncoming::Request(request) if request.method == methods::INITIALIZED => {
                self.notify(
                    JsonRpcNotification::new(request.method, request.params),
                    context,
                )
                .await;
                None
            }
            JsonRpcIncoming::Request(request) => {
                debug!(
                    "Dispatching {} (id={}) for session {}",
                    request.method,
                    request.id,
                    session.id()
                );
                Some(self.inner.handle_request_with_context(request, context).await)
            }
        }
    }

    async fn notify(&self, notification: JsonRpcNotification, context: SessionContext) {
        let method = notification.method.clone();
        let session_id = context.session_id.clone();
        if let Err(err) = self
            .inner
            .handle_notification_with_context(notification, Some(context))
            .await
        {
            warn!(
                "Notification {} failed for session {}: {}",
                method, session_id, err
            );
        }
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.inner.registered_methods()
    }
}

fn session_context(session: &Session) -> SessionContext {
    let context = SessionContext::new(session.id());
    match session.origin() {
        Some(origin) => context.with_metadata("origin", origin.into()),
        None => context,
    }
}
