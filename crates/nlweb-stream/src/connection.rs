//! # Connection Manager
//!
//! Owns one event-stream connection and its reconnect policy.
//!
//! The manager is pull-based: the owner calls [`ConnectionManager::next_event`]
//! in a loop and receives [`ConnectionEvent`]s. Connecting, reading and the
//! backoff wait all happen inside that call, so the manager never spawns a
//! task and never holds a timer that can fire after [`close`].
//!
//! ## Reconnect policy
//!
//! Any terminal transport error (connect failure, read error, or the server
//! closing the body) consults [`RetryConfig::decide`]. While retries remain,
//! the retry count is incremented and a reconnect deadline is stored; the next
//! call waits for it and reopens. Once the ceiling is reached the manager
//! stops permanently and reports [`ConnectionEvent::Failed`] once. A
//! successful open resets the retry count.
//!
//! ## Cancellation
//!
//! `next_event` is cancel-safe. The reconnect deadline is state, not a sleeping
//! task: dropping the future mid-wait loses nothing, and [`close`] clears the
//! deadline so a stopped manager never reconnects.
//!
//! [`close`]: ConnectionManager::close

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nlweb_core::{RetryConfig, RetryDecision};
use reqwest::Url;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::transport::{RawEventStream, Transport};

/// Longest wait a reconnect deadline is scheduled for.
const MAX_RECONNECT_WAIT: Duration = Duration::from_secs(86_400 * 365);

/// Observable result of driving the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The stream was established.
    Opened,
    /// One raw event payload.
    Message(String),
    /// The connection failed and a reconnect is scheduled.
    Retrying {
        /// One-based retry number.
        attempt: u32,
        /// Retry ceiling.
        max_retries: u32,
        /// Wait before reconnecting, in ms.
        delay_ms: u64,
    },
    /// Retries are exhausted; the manager is stopped.
    Failed {
        /// Retries made before giving up.
        retries: u32,
    },
    /// The manager is stopped or was never opened.
    Closed,
}

/// Retry bookkeeping, observable for diagnostics and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Consecutive failed attempts since the last successful open.
    pub retry_count: u32,
    /// Retry ceiling.
    pub max_retries: u32,
    /// Whether the manager has been stopped.
    pub is_stopped: bool,
}

/// One reconnecting event-stream connection.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    url: Option<Url>,
    state: ConnectionState,
    stream: Option<RawEventStream>,
    needs_connect: bool,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// Create an idle manager.
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        let state = ConnectionState {
            max_retries: retry.max_retries,
            ..ConnectionState::default()
        };
        Self {
            transport,
            retry,
            url: None,
            state,
            stream: None,
            needs_connect: false,
            reconnect_at: None,
        }
    }

    /// Record `url` and schedule a connection attempt.
    ///
    /// Replaces any current connection. Ignored once the manager is stopped;
    /// only [`reset`](Self::reset) revives it.
    pub fn open(&mut self, url: Url) {
        if self.state.is_stopped {
            debug!(%url, "open ignored, connection is stopped");
            return;
        }
        self.stream = None;
        self.reconnect_at = None;
        self.url = Some(url);
        self.needs_connect = true;
    }

    /// Stop permanently: drop the stream and cancel any pending reconnect.
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("event stream closed");
        }
        self.reconnect_at = None;
        self.needs_connect = false;
        self.state.is_stopped = true;
    }

    /// Clear the retry count and stopped flag, then reopen the last URL.
    pub fn reset(&mut self) {
        self.close();
        self.state.retry_count = 0;
        self.state.is_stopped = false;
        self.needs_connect = self.url.is_some();
    }

    /// Current retry bookkeeping.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Whether a stream is currently established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// When the pending reconnect fires, if one is scheduled.
    #[must_use]
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// The endpoint URL, once opened.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Drive the connection until something observable happens.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            if self.state.is_stopped {
                return ConnectionEvent::Closed;
            }

            if let Some(stream) = self.stream.as_mut() {
                match stream.next().await {
                    Some(Ok(data)) => return ConnectionEvent::Message(data),
                    Some(Err(err)) => {
                        self.stream = None;
                        return self.handle_failure(&err);
                    }
                    None => {
                        self.stream = None;
                        return self.handle_failure(&TransportError::Closed);
                    }
                }
            }

            if !self.needs_connect {
                return ConnectionEvent::Closed;
            }

            if let Some(deadline) = self.reconnect_at {
                tokio::time::sleep_until(deadline).await;
                self.reconnect_at = None;
                continue;
            }

            let Some(url) = self.url.clone() else {
                return ConnectionEvent::Closed;
            };
            match self.transport.open(&url).await {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.needs_connect = false;
                    self.state.retry_count = 0;
                    info!(%url, "event stream opened");
                    return ConnectionEvent::Opened;
                }
                Err(err) => return self.handle_failure(&err),
            }
        }
    }

    fn handle_failure(&mut self, err: &TransportError) -> ConnectionEvent {
        match self.retry.decide(self.state.retry_count) {
            RetryDecision::Retry { attempt, delay_ms } => {
                self.state.retry_count = attempt;
                self.needs_connect = true;
                self.reconnect_at = Some(deadline_after(Instant::now(), delay_ms));
                warn!(
                    error = %err,
                    category = err.category(),
                    attempt,
                    max_retries = self.retry.max_retries,
                    delay_ms,
                    "event stream failed, reconnecting"
                );
                ConnectionEvent::Retrying {
                    attempt,
                    max_retries: self.retry.max_retries,
                    delay_ms,
                }
            }
            RetryDecision::Stop => {
                let retries = self.state.retry_count;
                warn!(
                    error = %err,
                    category = err.category(),
                    retries,
                    "max retries reached, stopping reconnection attempts"
                );
                self.close();
                ConnectionEvent::Failed { retries }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("state", &self.state)
            .field("is_open", &self.stream.is_some())
            .field("reconnect_at", &self.reconnect_at)
            .finish_non_exhaustive()
    }
}

/// Deadline `delay_ms` after `now`, capped so huge configured delays cannot
/// overflow the clock.
fn deadline_after(now: Instant, delay_ms: u64) -> Instant {
    now + Duration::from_millis(delay_ms).min(MAX_RECONNECT_WAIT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
