//! SSE MCP server and its builder

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use sse_mcp_protocol::Implementation;

use crate::config::{ServerConfig, StreamConfig};
use crate::dispatch::McpDispatcher;
use crate::session::SessionRegistry;
use crate::tool::{McpTool, ToolRegistry};
use crate::transport::SseTransport;
use crate::{HttpMcpError, Result};

/// Builder for [`SseMcpServer`]
pub struct SseMcpServerBuilder {
    name: String,
    version: String,
    config: ServerConfig,
    stream_config: StreamConfig,
    tools: Vec<Arc<dyn McpTool>>,
}

impl SseMcpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "sse-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: ServerConfig::default(),
            stream_config: StreamConfig::default(),
            tools: Vec::new(),
        }
    }

    /// Server name reported in `initialize`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Server version reported in `initialize`
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn sse_path(mut self, path: impl Into<String>) -> Self {
        self.config.sse_path = path.into();
        self
    }

    pub fn message_path(mut self, path: impl Into<String>) -> Self {
        self.config.message_path = path.into();
        self
    }

    /// Replace the `Origin` prefix allow-list
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Announce endpoints under this base instead of the request's `Host`
    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_base_url = Some(url.into());
        self
    }

    pub fn strict_lifecycle(mut self, strict: bool) -> Self {
        self.config.strict_lifecycle = strict;
        self
    }

    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn McpTool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Validate the configuration and assemble the server.
    pub fn build(self) -> Result<SseMcpServer> {
        if self.name.trim().is_empty() {
            return Err(HttpMcpError::Configuration(
                "server name must not be empty".to_string(),
            ));
        }
        self.config.validate()?;
        self.stream_config.validate()?;

        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register(tool)?;
        }
        debug!("Registered {} tools", registry.len());

        let config = Arc::new(self.config);
        let sessions = Arc::new(SessionRegistry::new(
            self.stream_config,
            config.max_sessions,
        ));
        let dispatcher = Arc::new(McpDispatcher::new(
            Implementation::new(self.name, self.version),
            Arc::new(registry),
            Arc::clone(&sessions),
            config.strict_lifecycle,
        ));

        Ok(SseMcpServer {
            transport: SseTransport::new(config, sessions, dispatcher),
        })
    }
}

impl Default for SseMcpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of server state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub sessions: usize,
}

#[derive(Clone)]
pub struct SseMcpServer {
    transport: SseTransport,
}

impl SseMcpServer {
    pub fn builder() -> SseMcpServerBuilder {
        SseMcpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        self.transport.config()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.transport.sessions()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            sessions: self.sessions().len(),
        }
    }

    /// Bind the configured address and serve until the process ends.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config().bind_address).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Accept connections until `shutdown` resolves, then close every live session.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        let config = self.config();
        info!("SSE MCP server listening on {}", local_addr);
        info!(
            "Push stream at {}, request leg at {}/{{sessionId}}",
            config.sse_path, config.message_path
        );

        tokio::pin!(shutdown);
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing {} sessions", self.sessions().len());
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        error!("Failed to accept connection: {}", err);
                        continue;
                    }
                },
            };
            debug!("New connection from {}", peer_addr);

            let transport = self.transport.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let transport = transport.clone();
                    async move { Ok::<_, hyper::Error>(transport.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() || err.is_canceled() {
                        debug!("Connection from {} closed: {}", peer_addr, err);
                    } else {
                        error!("Error serving connection from {}: {}", peer_addr, err);
                    }
                }
            });
        }

        self.sessions().close_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use sse_mcp_json_rpc::SessionContext;
    use sse_mcp_protocol::{McpResult, ToolSchema};

    struct Noop(&'static str);

    #[async_trait]
    impl McpTool for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
        }

        async fn call(
            &self,
            _arguments: Map<String, Value>,
            _session: Option<&SessionContext>,
        ) -> McpResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_builder_defaults() {
        let server = SseMcpServer::builder().tool(Noop("noop")).build().unwrap();
        assert_eq!(server.config().sse_path, "/sse");
        assert_eq!(server.config().message_path, "/message");
        assert_eq!(server.stats(), ServerStats { sessions: 0 });
    }

    #[test]
    fn test_builder_rejects_duplicate_tools() {
        let result = SseMcpServer::builder()
            .tool(Noop("noop"))
            .tool_arc(Arc::new(Noop("noop")))
            .build();
        assert!(matches!(result, Err(HttpMcpError::Mcp(_))));
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let result = SseMcpServer::builder().sse_path("sse").build();
        assert!(matches!(result, Err(HttpMcpError::Configuration(_))));

        let result = SseMcpServer::builder().max_sessions(0).build();
        assert!(matches!(result, Err(HttpMcpError::Configuration(_))));

        let result = SseMcpServer::builder().name("  ").build();
        assert!(matches!(result, Err(HttpMcpError::Configuration(_))));

        let result = SseMcpServer::builder()
            .stream_config(StreamConfig {
                keepalive_interval_seconds: 0,
                ..StreamConfig::default()
            })
            .build();
        assert!(matches!(result, Err(HttpMcpError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let server = SseMcpServer::builder().build().unwrap();
        let session = server.sessions().create("s1", None).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server
            .serve_with_shutdown(listener, async {})
            .await
            .unwrap();

        assert!(server.sessions().is_empty());
        assert!(session.channel().is_closed());
    }
}
