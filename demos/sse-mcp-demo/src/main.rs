//! # SSE MCP Demo Server
//!
//! Serves three tools (`hello_world`, `get_time`, `echo`) over the HTTP+SSE
//! transport.
//!
//! ## Usage
//! ```bash
//! cargo run --package sse-mcp-demo -- --port 8080
//!
//! # In another terminal, open the push stream:
//! curl -N "http://127.0.0.1:8080/sse?clientId=demo"
//!
//! # And post to the announced endpoint:
//! curl -X POST http://127.0.0.1:8080/message/demo \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}},"id":"1"}'
//! ```

mod tools;

use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sse_mcp_server::prelude::*;

use crate::tools::{EchoTool, GetTimeTool, HelloWorldTool};

#[derive(Parser, Debug)]
#[command(name = "sse-mcp-demo")]
#[command(about = "MCP demo server over HTTP+SSE")]
struct Args {
    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path of the push stream
    #[arg(long, default_value = "/sse")]
    sse_path: String,

    /// Path of the request leg
    #[arg(long, default_value = "/message")]
    message_path: String,

    /// Base URL announced to clients, e.g. when running behind a proxy
    #[arg(long)]
    public_base_url: Option<String>,

    /// Additional allowed `Origin` prefixes (repeatable)
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,

    /// Reject tool calls until the session completes the handshake
    #[arg(long)]
    strict: bool,

    #[arg(long, default_value_t = 30)]
    keepalive_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let bind_address = SocketAddr::new(args.host, args.port);

    let mut builder = SseMcpServer::builder()
        .name("sse-mcp-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .bind_address(bind_address)
        .sse_path(args.sse_path)
        .message_path(args.message_path)
        .strict_lifecycle(args.strict)
        .stream_config(StreamConfig {
            keepalive_interval_seconds: args.keepalive_secs,
            ..StreamConfig::default()
        })
        .tool(HelloWorldTool)
        .tool(GetTimeTool)
        .tool(EchoTool);

    if !args.allow_origins.is_empty() {
        let origins = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .chain(args.allow_origins);
        builder = builder.allowed_origins(origins);
    }
    if let Some(base) = args.public_base_url {
        builder = builder.public_base_url(base);
    }

    let server = builder.build()?;
    let listener = TcpListener::bind(bind_address).await?;
    info!(
        "Open the push stream at http://{}{}",
        listener.local_addr()?,
        server.config().sse_path
    );

    server
        .serve_with_shutdown(listener, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(err) => {
                    warn!("Cannot listen for Ctrl-C: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
