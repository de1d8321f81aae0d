//! Server and stream configuration

use std::net::{Ipv4Addr, SocketAddr};

use crate::{HttpMcpError, Result};

/// Origin prefixes accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost", "http://127.0.0.1", "null"];

/// Configuration for the HTTP side of the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Path of the push stream (`GET`)
    pub sse_path: String,
    /// Path of the request leg (`POST`), with or without a trailing `/{sessionId}`
    pub message_path: String,
    pub enable_cors: bool,
    pub max_body_size: usize,
    /// `Origin` prefixes accepted on both legs. An absent `Origin` is always accepted.
    pub allowed_origins: Vec<String>,
    /// Base used for the endpoint announcement instead of the request's `Host`
    pub public_base_url: Option<String>,
    /// Reject `tools/*` on sessions that have not completed the handshake
    pub strict_lifecycle: bool,
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            sse_path: "/sse".to_string(),
            message_path: "/message".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            public_base_url: None,
            strict_lifecycle: false,
            max_sessions: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("sse_path", &self.sse_path), ("message_path", &self.message_path)] {
            if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
                return Err(HttpMcpError::Configuration(format!(
                    "{} must start with '/' and not end with '/': {:?}",
                    name, path
                )));
            }
        }
        if self.sse_path == self.message_path {
            return Err(HttpMcpError::Configuration(
                "sse_path and message_path must differ".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(HttpMcpError::Configuration(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if let Some(base) = &self.public_base_url {
            url::Url::parse(base).map_err(|e| {
                HttpMcpError::Configuration(format!("invalid public_base_url {:?}: {}", base, e))
            })?;
        }
        Ok(())
    }
}

/// What happens when a push stream consumer falls behind its buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Discard the oldest undelivered events and keep streaming
    #[default]
    DropOldest,
    /// Disconnect the consumer and tear the session down
    CloseSession,
}

/// Configuration for per-session push streams
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Events buffered per session before the overflow policy applies
    pub channel_buffer_size: usize,
    pub keepalive_interval_seconds: u64,
    pub overflow_policy: OverflowPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            keepalive_interval_seconds: 30,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_buffer_size == 0 {
            return Err(HttpMcpError::Configuration(
                "channel_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.keepalive_interval_seconds == 0 {
            return Err(HttpMcpError::Configuration(
                "keepalive_interval_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
