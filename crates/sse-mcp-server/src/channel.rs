//! Per-session outbound channel and push stream
//!
//! Each session owns one [`OutboundChannel`]. Request handlers publish
//! response envelopes into it from any task; exactly one push stream drains
//! it. The stream always starts with the `endpoint` event, then yields
//! messages in publish order interleaved with `ping` keep-alives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sse_mcp_json_rpc::JsonRpcMessage;

use crate::config::{OverflowPolicy, StreamConfig};

/// Payload of every keep-alive event
pub const PING_DATA: &str = r#"{"type":"ping"}"#;

/// Events carried on a push stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Absolute URI of the session's request leg
    Endpoint(String),
    /// A serialized JSON-RPC envelope
    Message(String),
    Ping,
}

impl SseEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SseEvent::Endpoint(_) => "endpoint",
            SseEvent::Message(_) => "message",
            SseEvent::Ping => "ping",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            SseEvent::Endpoint(uri) => uri,
            SseEvent::Message(json) => json,
            SseEvent::Ping => PING_DATA,
        }
    }

    /// Wire form: one `data:` line per payload line, blank line terminated.
    pub fn format(&self) -> String {
        let mut out = format!("event: {}\n", self.event_type());
        for line in self.data().split('\n') {
            out.push_str("data: ");
            out.push_str(line.trim_end_matches('\r'));
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Channel already has a consumer")]
    AlreadySubscribed,

    #[error("Channel buffer of {0} events overflowed")]
    Overflow(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug)]
struct CloseState {
    closing: AtomicBool,
    token: CancellationToken,
}

impl CloseState {
    /// Returns true only for the call that actually closed.
    fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }
}

/// FIFO holding at most `capacity` undelivered events
#[derive(Debug)]
struct Outbox {
    events: Mutex<VecDeque<SseEvent>>,
    capacity: usize,
    policy: OverflowPolicy,
    overflowed: AtomicBool,
    ready: Notify,
}

impl Outbox {
    fn new(config: &StreamConfig) -> Self {
        let capacity = config.channel_buffer_size.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            policy: config.overflow_policy,
            overflowed: AtomicBool::new(false),
            ready: Notify::new(),
        }
    }

    fn push(&self, session_id: &str, event: SseEvent) -> Result<(), ChannelError> {
        if self.overflowed.load(Ordering::SeqCst) {
            return Err(ChannelError::Overflow(self.capacity));
        }

        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    events.pop_front();
                    warn!(
                        "Push stream for session {} is full, dropped the oldest event",
                        session_id
                    );
                }
                OverflowPolicy::CloseSession => {
                    drop(events);
                    self.overflowed.store(true, Ordering::SeqCst);
                    self.ready.notify_one();
                    warn!(
                        "Push stream for session {} overflowed {} events, closing session",
                        session_id, self.capacity
                    );
                    return Err(ChannelError::Overflow(self.capacity));
                }
            }
        }
        events.push_back(event);
        drop(events);

        self.ready.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<SseEvent> {
        self.events.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.events.lock().len()
    }
}

/// Bounded, single-consumer outbound queue of one session
#[derive(Debug)]
pub struct OutboundChannel {
    session_id: String,
    // Publishes before the push stream subscribes stay buffered here.
    outbox: Arc<Outbox>,
    subscribed: AtomicBool,
    state: Arc<CloseState>,
    config: StreamConfig,
}

impl OutboundChannel {
    pub fn new(session_id: impl Into<String>, config: StreamConfig) -> Self {
        Self {
            session_id: session_id.into(),
            outbox: Arc::new(Outbox::new(&config)),
            subscribed: AtomicBool::new(false),
            state: Arc::new(CloseState {
                closing: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
            config,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Serialize and enqueue an envelope. Never blocks.
    pub fn publish(&self, message: &JsonRpcMessage) -> Result<(), ChannelError> {
        let data = message.to_json_string()?;
        self.publish_event(SseEvent::Message(data))
    }

    pub fn publish_event(&self, event: SseEvent) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.outbox.push(&self.session_id, event)
    }

    /// Stop accepting publishes and end the push stream. Idempotent; returns
    /// true for the call that performed the close.
    pub fn close(&self) -> bool {
        let closed = self.state.close();
        if closed {
            self.outbox.events.lock().clear();
            debug!("Outbound channel closed: session={}", self.session_id);
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.state.closing.load(Ordering::SeqCst)
    }

    /// Events queued and not yet consumed, never more than the buffer size
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Take the single consumer side as a push stream.
    ///
    /// `on_close` runs exactly once when the stream is dropped, whether it
    /// ended on its own or the peer went away.
    pub fn event_stream<F>(
        &self,
        endpoint: String,
        on_close: F,
    ) -> Result<BoxStream<'static, SseEvent>, ChannelError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadySubscribed);
        }

        let guard = TeardownGuard {
            session_id: self.session_id.clone(),
            state: Arc::clone(&self.state),
            on_close: Some(Box::new(on_close)),
        };
        let outbox = Arc::clone(&self.outbox);
        let closed = self.state.token.clone();
        let session_id = self.session_id.clone();
        let period = Duration::from_secs(self.config.keepalive_interval_seconds.max(1));

        let stream = async_stream::stream! {
            let _guard = guard;

            yield SseEvent::Endpoint(endpoint);

            let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
            keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if outbox.overflowed.load(Ordering::SeqCst) {
                    break;
                }
                if closed.is_cancelled() {
                    debug!("Push stream closing: session={}", session_id);
                    break;
                }
                if let Some(event) = outbox.pop() {
                    yield event;
                    continue;
                }

                tokio::select! {
                    biased;

                    _ = closed.cancelled() => {
                        debug!("Push stream closing: session={}", session_id);
                        break;
                    }

                    _ = outbox.ready.notified() => {}

                    _ = keepalive.tick() => {
                        yield SseEvent::Ping;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

struct TeardownGuard {
    session_id: String,
    state: Arc<CloseState>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.state.close();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        debug!("Push stream dropped: session={}", self.session_id);
    }
}
