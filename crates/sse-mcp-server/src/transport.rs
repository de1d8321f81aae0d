//! HTTP+SSE transport front
//!
//! `GET {sse_path}` opens a push stream and creates its session.
//! `POST {message_path}/{sessionId}` (or `?sessionId=`) carries one JSON-RPC
//! envelope; the reply goes out on the session's push stream and the POST
//! itself is answered with `202 Accepted`.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http::header::{
    ALLOW, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue,
};
use http::{Method, Request, Response, StatusCode};
use http_body::{Body, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited, StreamBody};
use tracing::{debug, error, info, warn};

use sse_mcp_json_rpc::{JsonRpcError, JsonRpcMessage, parse_json_rpc_message};

use crate::config::ServerConfig;
use crate::cors::CorsLayer;
use crate::dispatch::McpDispatcher;
use crate::origin::OriginValidator;
use crate::session::{SessionError, SessionRegistry, generate_session_id};

/// Body type of every response produced by the transport
pub type McpBody = UnsyncBoxBody<Bytes, hyper::Error>;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Session id fallback for a request leg that names no session
pub const DEFAULT_SESSION_ID: &str = "default";

enum Route {
    Sse,
    Message(String),
    NotFound,
}

#[derive(Clone)]
pub struct SseTransport {
    config: Arc<ServerConfig>,
    sessions: Arc<SessionRegistry>,
    dispatcher: Arc<McpDispatcher>,
    origins: OriginValidator,
}

impl SseTransport {
    pub fn new(
        config: Arc<ServerConfig>,
        sessions: Arc<SessionRegistry>,
        dispatcher: Arc<McpDispatcher>,
    ) -> Self {
        let origins = OriginValidator::new(config.allowed_origins.clone());
        Self {
            config,
            sessions,
            dispatcher,
            origins,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one HTTP request. Never fails: every error becomes a status code.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        let origin = self.origins.check(req.headers());
        let route = self.route(&path, req.uri().query());

        let mut response = match (route, origin.as_ref()) {
            (Route::NotFound, _) => text_response(StatusCode::NOT_FOUND, "Not Found"),
            (_, _) if method == Method::OPTIONS => empty_response(StatusCode::NO_CONTENT),
            (_, Err(rejected)) => {
                warn!("Rejected origin {:?} on {} {}", rejected, method, path);
                text_response(StatusCode::FORBIDDEN, "Forbidden: origin not allowed")
            }
            (Route::Sse, Ok(origin)) if method == Method::GET => {
                self.handle_sse(req.headers(), req.uri().query(), origin.clone())
            }
            (Route::Message(session_id), Ok(_)) if method == Method::POST => {
                self.handle_message(req.into_body(), session_id).await
            }
            (Route::Sse, Ok(_)) => method_not_allowed("GET, OPTIONS"),
            (Route::Message(_), Ok(_)) => method_not_allowed("POST, OPTIONS"),
        };

        // A rejected origin gets no Access-Control-* headers at all.
        if let (true, Ok(allowed)) = (self.config.enable_cors, origin.as_ref()) {
            CorsLayer::apply_cors_headers(response.headers_mut(), allowed.as_deref());
        }
        response
    }

    fn route(&self, path: &str, query: Option<&str>) -> Route {
        if path == self.config.sse_path {
            return Route::Sse;
        }
        if path == self.config.message_path {
            let session_id = query_param(query, "sessionId")
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
            return Route::Message(session_id);
        }
        match path
            .strip_prefix(self.config.message_path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(id) if !id.is_empty() && !id.contains('/') => Route::Message(id.to_string()),
            _ => Route::NotFound,
        }
    }

    fn handle_sse(
        &self,
        headers: &HeaderMap,
        query: Option<&str>,
        origin: Option<String>,
    ) -> Response<McpBody> {
        let requested = query_param(query, "clientId")
            .or_else(|| query_param(query, "sessionId"))
            .filter(|id| !id.is_empty());

        let session_id = match requested {
            Some(id) if is_valid_session_id(&id) => id,
            Some(id) => {
                warn!("Rejected invalid client session id {:?}", id);
                return text_response(StatusCode::BAD_REQUEST, "Invalid session id");
            }
            None => generate_session_id(),
        };

        let session = match self.sessions.create(session_id.clone(), origin) {
            Ok(session) => session,
            Err(err @ SessionError::AlreadyExists(_)) => {
                warn!("SSE connect refused: {}", err);
                return text_response(StatusCode::CONFLICT, &err.to_string());
            }
            Err(err @ SessionError::LimitReached(_)) => {
                warn!("SSE connect refused: {}", err);
                return text_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string());
            }
        };

        let endpoint = self.endpoint_uri(headers, &session_id);
        let registry = Arc::downgrade(&self.sessions);
        let owned = Arc::clone(&session);
        let stream = session.channel().event_stream(endpoint.clone(), move || {
            match registry.upgrade() {
                Some(registry) => {
                    registry.remove_session(&owned);
                }
                None => {
                    owned.channel().close();
                }
            }
            info!("SSE session {} disconnected", owned.id());
        });

        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                error!("Failed to open push stream for {}: {}", session_id, err);
                self.sessions.remove_session(&session);
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            }
        };

        info!("SSE session {} connected, endpoint {}", session_id, endpoint);

        let frames = stream.map(|event| Ok::<_, Infallible>(Frame::data(Bytes::from(event.format()))));
        let body: McpBody = StreamBody::new(frames)
            .map_err(|never| match never {})
            .boxed_unsync();
        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(X_ACCEL_BUFFERING, HeaderValue::from_static("no"));
        response
    }

    async fn handle_message<B>(&self, body: B, session_id: String) -> Response<McpBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let bytes = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(
                    "Request body for session {} exceeds {} bytes",
                    session_id, self.config.max_body_size
                );
                return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            Err(err) => {
                warn!("Failed to read request body for session {}: {}", session_id, err);
                return text_response(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(err) => return error_envelope_response(JsonRpcError::parse_error(Some(err.to_string()))),
        };

        let incoming = match parse_json_rpc_message(text) {
            Ok(incoming) => incoming,
            // An id was recovered, so the error can be correlated on the push stream.
            Err(error) if error.id.is_some() => {
                debug!("Invalid request for session {}: {}", session_id, error);
                self.publish(&session_id, &JsonRpcMessage::error(error));
                return empty_response(StatusCode::ACCEPTED);
            }
            Err(error) => {
                debug!("Undeliverable error for session {}: {}", session_id, error);
                return error_envelope_response(error);
            }
        };

        let Some(session) = self.sessions.get(&session_id) else {
            warn!(
                "Dropping {} for unknown session {}",
                incoming.method(),
                session_id
            );
            return empty_response(StatusCode::ACCEPTED);
        };

        if let Some(response) = self.dispatcher.dispatch(&session, incoming).await {
            if let Err(err) = session.channel().publish(&response) {
                warn!("Dropping response for session {}: {}", session_id, err);
            }
        }

        empty_response(StatusCode::ACCEPTED)
    }

    fn publish(&self, session_id: &str, message: &JsonRpcMessage) {
        match self.sessions.get(session_id) {
            Some(session) => {
                if let Err(err) = session.channel().publish(message) {
                    warn!("Dropping response for session {}: {}", session_id, err);
                }
            }
            None => warn!("Dropping response for unknown session {}", session_id),
        }
    }

    /// Absolute request-leg URI announced to the client.
    fn endpoint_uri(&self, headers: &HeaderMap, session_id: &str) -> String {
        let base = match &self.config.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => {
                let scheme = headers
                    .get(X_FORWARDED_PROTO)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.split(',').next())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or("http");
                let host = headers
                    .get(HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
                    .unwrap_or_else(|| self.config.bind_address.to_string());
                format!("{}://{}", scheme, strip_default_port(scheme, &host))
            }
        };
        format!("{}{}/{}", base, self.config.message_path, session_id)
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Client-chosen ids end up in a URI path, so only unreserved characters are allowed.
fn is_valid_session_id(id: &str) -> bool {
    id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

fn strip_default_port<'a>(scheme: &str, host: &'a str) -> &'a str {
    let default_port = match scheme {
        "http" => "80",
        "https" => "443",
        _ => return host,
    };
    match host.rsplit_once(':') {
        Some((name, port)) if port == default_port => name,
        _ => host,
    }
}

fn full_body(bytes: Bytes) -> McpBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

fn empty_response(status: StatusCode) -> Response<McpBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, text: &str) -> Response<McpBody> {
    let mut response = Response::new(full_body(Bytes::from(text.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn method_not_allowed(allow: &'static str) -> Response<McpBody> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

/// `400` carrying an error envelope that has no push stream to go to.
fn error_envelope_response(error: JsonRpcError) -> Response<McpBody> {
    let body = match serde_json::to_vec(&error) {
        Ok(body) => body,
        Err(err) => {
            error!("Failed to serialize error envelope: {}", err);
            return text_response(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };
    let mut response = Response::new(full_body(Bytes::from(body)));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
