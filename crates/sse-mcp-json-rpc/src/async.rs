use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    error::{JsonRpcError, JsonRpcErrorObject},
    notification::JsonRpcNotification,
    request::{JsonRpcRequest, RequestParams},
    response::{JsonRpcMessage, ResponseResult},
};

/// Session information handed to handlers alongside each call
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub metadata: HashMap<String, Value>,
    /// Unix milliseconds at which the envelope was received
    pub timestamp: u64,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            session_id: session_id.into(),
            metadata: HashMap::new(),
            timestamp,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Handles one or more JSON-RPC methods
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle a request. Domain errors are converted by the dispatcher.
    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> Result<Value, Self::Error>;

    /// Handle a notification. Ignored unless overridden.
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, session_context);
        Ok(())
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![]
    }
}

/// Errors that know their JSON-RPC error object
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Routes envelopes to handlers by exact method name
pub struct JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Error = E>>>,
    default_handler: Option<Arc<dyn JsonRpcHandler<Error = E>>>,
}

impl<E> JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: None,
        }
    }

    pub fn register_method<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    /// Register one handler under several method names.
    pub fn register_methods<H>(&mut self, methods: Vec<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        let handler_arc: Arc<dyn JsonRpcHandler<Error = E>> = Arc::new(handler);
        for method in methods {
            self.handlers.insert(method, Arc::clone(&handler_arc));
        }
    }

    pub fn set_default_handler<H>(&mut self, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.default_handler = Some(Arc::new(handler));
    }

    fn handler_for(&self, method: &str) -> Option<&Arc<dyn JsonRpcHandler<Error = E>>> {
        self.handlers.get(method).or(self.default_handler.as_ref())
    }

    /// Run a request through its handler and build exactly one response.
    ///
    /// A handler that panics yields an internal error for that request only.
    pub async fn handle_request_with_context(
        &self,
        request: JsonRpcRequest,
        session_context: SessionContext,
    ) -> JsonRpcMessage {
        let Some(handler) = self.handler_for(&request.method) else {
            debug!("Method not found: {}", request.method);
            return JsonRpcMessage::error(JsonRpcError::method_not_found(
                request.id,
                &request.method,
            ));
        };

        let outcome = AssertUnwindSafe(handler.handle(
            &request.method,
            request.params,
            Some(session_context),
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(result)) => JsonRpcMessage::success(request.id, ResponseResult::from(result)),
            Ok(Err(domain_error)) => {
                debug!("Handler for {} failed: {}", request.method, domain_error);
                JsonRpcMessage::error(JsonRpcError::new(
                    Some(request.id),
                    domain_error.to_error_object(),
                ))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Handler for {} panicked: {}", request.method, message);
                JsonRpcMessage::error(JsonRpcError::internal_error(
                    Some(request.id),
                    Some(message),
                ))
            }
        }
    }

    /// Run a notification through its handler. Unknown methods are ignored
    /// and nothing is ever answered.
    pub async fn handle_notification_with_context(
        &self,
        notification: JsonRpcNotification,
        session_context: Option<SessionContext>,
    ) -> Result<(), E> {
        let Some(handler) = self.handler_for(&notification.method) else {
            debug!("Ignoring unknown notification: {}", notification.method);
            return Ok(());
        };

        let outcome = AssertUnwindSafe(handler.handle_notification(
            &notification.method,
            notification.params,
            session_context,
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                warn!(
                    "Notification handler for {} panicked: {}",
                    notification.method,
                    panic_message(panic.as_ref())
                );
                Ok(())
            }
        }
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl<E> Default for JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonRpcErrorCode, RequestId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("Test error: {0}")]
        Failed(String),
    }

    impl ToJsonRpcError for TestError {
        fn to_error_object(&self) -> JsonRpcErrorObject {
            match self {
                TestError::Failed(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
            }
        }
    }

    struct TestHandler {
        notifications: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JsonRpcHandler for TestHandler {
        type Error = TestError;

        async fn handle(
            &self,
            method: &str,
            params: Option<RequestParams>,
            _session_context: Option<SessionContext>,
        ) -> Result<Value, Self::Error> {
            match method {
                "add" => Ok(json!({"params": params.map(|p| p.into_value())})),
                "fail" => Err(TestError::Failed("nope".to_string())),
                "panic" => panic!("kaboom"),
                _ => Ok(Value::Null),
            }
        }

        async fn handle_notification(
            &self,
            _method: &str,
            _params: Option<RequestParams>,
            _session_context: Option<SessionContext>,
        ) -> Result<(), Self::Error> {
            self.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher(counter: Arc<AtomicUsize>) -> JsonRpcDispatcher<TestError> {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register_methods(
            vec!["add".to_string(), "fail".to_string(), "panic".to_string(), "note".to_string()],
            TestHandler {
                notifications: counter,
            },
        );
        dispatcher
    }

    #[tokio::test]
    async fn test_dispatcher_success() {
        let dispatcher = dispatcher(Arc::default());
        let request = JsonRpcRequest::new_no_params(RequestId::Number(1), "add");

        let response = dispatcher
            .handle_request_with_context(request, SessionContext::new("s"))
            .await;
        assert_eq!(response.id(), Some(&RequestId::Number(1)));
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_dispatcher_method_not_found_preserves_id() {
        let dispatcher = dispatcher(Arc::default());
        let request = JsonRpcRequest::new_no_params(RequestId::from("2"), "bogus");

        let response = dispatcher
            .handle_request_with_context(request, SessionContext::new("s"))
            .await;
        match response {
            JsonRpcMessage::Error(error) => {
                assert_eq!(error.id, Some(RequestId::from("2")));
                assert_eq!(error.error.error_code(), Some(JsonRpcErrorCode::MethodNotFound));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_domain_error_is_converted() {
        let dispatcher = dispatcher(Arc::default());
        let request = JsonRpcRequest::new_no_params(RequestId::Number(3), "fail");

        let response = dispatcher
            .handle_request_with_context(request, SessionContext::new("s"))
            .await;
        match response {
            JsonRpcMessage::Error(error) => {
                assert_eq!(error.error.code, -32603);
                assert_eq!(error.error.message, "Internal error: nope");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal_error() {
        let dispatcher = dispatcher(Arc::default());
        let request = JsonRpcRequest::new_no_params(RequestId::Number(4), "panic");

        let response = dispatcher
            .handle_request_with_context(request, SessionContext::new("s"))
            .await;
        match response {
            JsonRpcMessage::Error(error) => {
                assert_eq!(error.id, Some(RequestId::Number(4)));
                assert_eq!(error.error.code, -32603);
                assert!(error.error.message.contains("kaboom"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notifications_are_routed_and_unknown_ignored() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Arc::clone(&counter));

        dispatcher
            .handle_notification_with_context(JsonRpcNotification::new_no_params("note"), None)
            .await
            .unwrap();
        dispatcher
            .handle_notification_with_context(JsonRpcNotification::new_no_params("unknown"), None)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_handler_catches_unregistered_methods() {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.set_default_handler(TestHandler {
            notifications: Arc::default(),
        });
        let request = JsonRpcRequest::new_no_params(RequestId::Number(5), "add");

        let response = dispatcher
            .handle_request_with_context(request, SessionContext::new("s"))
            .await;
        assert!(!response.is_error());
        assert!(dispatcher.registered_methods().is_empty());
    }

    #[test]
    fn test_registered_methods() {
        let dispatcher = dispatcher(Arc::default());
        let mut methods = dispatcher.registered_methods();
        methods.sort();
        assert_eq!(methods, vec!["add", "fail", "note", "panic"]);
    }
}
