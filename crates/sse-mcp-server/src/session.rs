//! Session registry
//!
//! Maps a session id to its live [`Session`]. The map sits behind a
//! synchronous lock so sessions can be removed from a `Drop` during push
//! stream teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channel::OutboundChannel;
use crate::config::StreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Session limit reached ({0} live sessions)")]
    LimitReached(usize),
}

/// One client conversation
#[derive(Debug)]
pub struct Session {
    id: String,
    channel: OutboundChannel,
    initialized: AtomicBool,
    created_at: DateTime<Utc>,
    origin: Option<String>,
}

impl Session {
    fn new(id: String, origin: Option<String>, stream_config: StreamConfig) -> Self {
        Self {
            channel: OutboundChannel::new(id.clone(), stream_config),
            id,
            initialized: AtomicBool::new(false),
            created_at: Utc::now(),
            origin,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> &OutboundChannel {
        &self.channel
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns false when the session was already initialized.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Generate a time-ordered session id.
pub fn generate_session_id() -> String {
    format!("client-{}", Uuid::now_v7())
}

/// Live sessions by id
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    stream_config: StreamConfig,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(stream_config: StreamConfig, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            stream_config,
            max_sessions,
        }
    }

    /// Register a new session together with its outbound channel.
    pub fn create(
        &self,
        id: impl Into<String>,
        origin: Option<String>,
    ) -> Result<Arc<Session>, SessionError> {
        let id = id.into();
        let mut sessions = self.sessions.write();

        if sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id));
        }
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::LimitReached(sessions.len()));
        }

        let session = Arc::new(Session::new(id.clone(), origin, self.stream_config.clone()));
        sessions.insert(id, Arc::clone(&session));
        info!(
            "Session created: {} (live sessions: {})",
            session.id(),
            sessions.len()
        );
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session and close its channel.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if let Some(session) = &removed {
            session.channel().close();
            info!("Session removed: {}", id);
        }
        removed
    }

    /// Remove `session` only if the registry still maps its id to this exact
    /// instance. The channel is closed either way.
    pub fn remove_session(&self, session: &Arc<Session>) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            match sessions.get(session.id()) {
                Some(current) if Arc::ptr_eq(current, session) => {
                    sessions.remove(session.id());
                    true
                }
                _ => false,
            }
        };
        session.channel().close();
        if removed {
            info!("Session removed: {}", session.id());
        } else {
            debug!("Session {} already gone from registry", session.id());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Remove and close every live session.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.channel().close();
        }
        if !drained.is_empty() {
            info!("Closed {} sessions", drained.len());
        }
        drained.len()
    }
}
