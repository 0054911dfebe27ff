//! # Query Session
//!
//! Orchestrates one query from request to outcome.
//!
//! ```text
//! Idle ──start──▶ Sending ──Opened──▶ AwaitingFirstEvent ──event──▶ Streaming
//!                    │                        │                        │
//!                    └────────────────────────┴──── complete/cancel ───┴──▶ Terminated
//!                    └──────────── retries exhausted ─────────────────────▶ Failed
//! ```
//!
//! The session owns its [`RoundState`] and [`SessionCorrelator`] outright;
//! everything runs on the caller's task through `&mut self`.
//! [`QuerySession::step`] processes one connection event and is safe to use
//! as a `select!` branch.

use std::fmt;
use std::sync::Arc;

use nlweb_core::{QueryId, QueryRequest, RetryConfig};
use reqwest::Url;
use tracing::{info, instrument, warn};

use crate::accumulator::RoundState;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::correlator::SessionCorrelator;
use crate::dispatcher::{Dispatch, DropReason, MessageDispatcher};
use crate::errors::{Result, StreamError};
use crate::renderer::{Renderer, SessionOutcome};
use crate::transport::{Transport, build_url};

/// Lifecycle of a [`QuerySession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Built, not started.
    Idle,
    /// Connection requested.
    Sending,
    /// Stream open, nothing processed yet.
    AwaitingFirstEvent,
    /// At least one event processed.
    Streaming,
    /// Completed or cancelled.
    Terminated,
    /// Connection failed permanently.
    Failed,
}

impl SessionState {
    /// Lowercase state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::AwaitingFirstEvent => "awaiting_first_event",
            Self::Streaming => "streaming",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query's streaming session.
#[derive(Debug)]
pub struct QuerySession {
    request: QueryRequest,
    url: Url,
    state: SessionState,
    round: RoundState,
    correlator: SessionCorrelator,
    dispatcher: MessageDispatcher,
    outcome: Option<SessionOutcome>,
}

impl QuerySession {
    /// Build an idle session for `request` against `endpoint`.
    pub fn new(
        request: QueryRequest,
        endpoint: &str,
        transport: Arc<dyn Transport>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let url = build_url(endpoint, &request)?;
        let connection = ConnectionManager::new(transport, retry);
        let correlator = SessionCorrelator::new(request.query_id.clone(), connection);
        Ok(Self {
            request,
            url,
            state: SessionState::Idle,
            round: RoundState::new(),
            correlator,
            dispatcher: MessageDispatcher::new(),
            outcome: None,
        })
    }

    /// The request this session sends.
    #[must_use]
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// The request's correlation ID.
    #[must_use]
    pub fn query_id(&self) -> &QueryId {
        &self.request.query_id
    }

    /// The streaming URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accumulated round state.
    #[must_use]
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Retry bookkeeping of the connection.
    #[must_use]
    pub fn connection_state(&self) -> &ConnectionState {
        self.correlator.connection().state()
    }

    /// How the session ended, once it has.
    #[must_use]
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Open the connection.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(StreamError::InvalidState {
                state: self.state.as_str(),
                expected: SessionState::Idle.as_str(),
            });
        }
        info!(
            query_id = %self.request.query_id,
            generate_mode = %self.request.generate_mode,
            site = self.request.site.as_deref().unwrap_or_default(),
            "query session started"
        );
        self.correlator.start(self.url.clone());
        self.state = SessionState::Sending;
        Ok(())
    }

    /// Process one connection event.
    ///
    /// Starts an idle session first. Returns the outcome once the session has
    /// ended, and keeps returning it on later calls.
    pub async fn step(&mut self, renderer: &mut dyn Renderer) -> Option<SessionOutcome> {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }
        if self.state == SessionState::Idle {
            self.start().ok()?;
        }

        match self.correlator.next_event().await {
            ConnectionEvent::Opened => {
                if self.state == SessionState::Sending {
                    self.state = SessionState::AwaitingFirstEvent;
                }
                None
            }
            ConnectionEvent::Message(raw) => match self.handle_payload(&raw, renderer) {
                Dispatch::Completed => self.outcome.clone(),
                Dispatch::Applied | Dispatch::Dropped(_) => None,
            },
            ConnectionEvent::Retrying { .. } => None,
            ConnectionEvent::Failed { retries } => {
                Some(self.finish(SessionOutcome::Failed { retries }, renderer))
            }
            ConnectionEvent::Closed => Some(self.finish(SessionOutcome::Cancelled, renderer)),
        }
    }

    /// Drive the session to its outcome.
    #[instrument(name = "query_session", skip_all, fields(query_id = %self.request.query_id))]
    pub async fn run(&mut self, renderer: &mut dyn Renderer) -> SessionOutcome {
        loop {
            if let Some(outcome) = self.step(renderer).await {
                return outcome;
            }
        }
    }

    /// Apply one raw payload as if it arrived on the stream.
    pub fn handle_payload(&mut self, raw: &str, renderer: &mut dyn Renderer) -> Dispatch {
        if self.state.is_finished() {
            return Dispatch::Dropped(DropReason::Terminated);
        }
        let dispatch = self
            .dispatcher
            .dispatch(raw, &mut self.round, &mut self.correlator, renderer);
        match dispatch {
            Dispatch::Applied => {
                if matches!(
                    self.state,
                    SessionState::Sending | SessionState::AwaitingFirstEvent
                ) {
                    self.state = SessionState::Streaming;
                }
            }
            Dispatch::Completed => {
                let result_count = self.round.results().len();
                let _ = self.finish(SessionOutcome::Completed { result_count }, renderer);
            }
            Dispatch::Dropped(_) => {}
        }
        dispatch
    }

    /// Cancel the session: close the connection and retire the query ID.
    ///
    /// Returns `false` if the session had already ended.
    pub fn cancel(&mut self, renderer: &mut dyn Renderer) -> bool {
        if self.state.is_finished() {
            return false;
        }
        self.correlator.invalidate();
        let _ = self.finish(SessionOutcome::Cancelled, renderer);
        true
    }

    fn finish(&mut self, outcome: SessionOutcome, renderer: &mut dyn Renderer) -> SessionOutcome {
        self.state = match outcome {
            SessionOutcome::Failed { .. } => SessionState::Failed,
            SessionOutcome::Completed { .. } | SessionOutcome::Cancelled => {
                SessionState::Terminated
            }
        };
        self.round.terminate();
        self.correlator.close();

        match &outcome {
            SessionOutcome::Failed { retries } => warn!(
                query_id = %self.request.query_id,
                retries,
                "query session failed"
            ),
            SessionOutcome::Completed { result_count } => info!(
                query_id = %self.request.query_id,
                result_count,
                "query session complete"
            ),
            SessionOutcome::Cancelled => info!(
                query_id = %self.request.query_id,
                "query session cancelled"
            ),
        }

        renderer.on_terminal_state(&outcome);
        self.outcome = Some(outcome.clone());
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use nlweb_core::GenerateMode;
    use serde_json::json;

    use super::*;
    use crate::renderer::RecordingRenderer;
    use crate::test_utils::{Script, ScriptedTransport};

    const ENDPOINT: &str = "http://localhost:8000/ask";

    fn request() -> QueryRequest {
        let mut request = QueryRequest::new("ramen", GenerateMode::List);
        request.query_id = QueryId::from("q1");
        request
    }

    fn session(scripts: Vec<Script>) -> (QuerySession, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(scripts));
        let session =
            QuerySession::new(request(), ENDPOINT, transport.clone(), RetryConfig::default())
                .unwrap();
        (session, transport)
    }

    fn event(value: serde_json::Value) -> String {
        value.to_string()
    }

    #[test]
    fn new_session_is_idle() {
        let (session, transport) = session(vec![]);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.round().is_first_event_pending());
        assert!(session.outcome().is_none());
        assert!(session.url().as_str().contains("query_id=q1"));
        assert_eq!(transport.open_count(), 0);
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let transport = Arc::new(ScriptedTransport::default());
        let err = QuerySession::new(request(), "::nope", transport, RetryConfig::default()).unwrap_err();
        assert_matches!(err, StreamError::InvalidEndpoint { .. });
    }

    #[test]
    fn start_twice_is_an_error() {
        let (mut session, _) = session(vec![]);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Sending);
        assert_matches!(
            session.start(),
            Err(StreamError::InvalidState { state: "sending", expected: "idle" })
        );
    }

    #[tokio::test]
    async fn walks_states_to_terminated() {
        let (mut session, _) = session(vec![Script::events([
            event(json!({"message_type": "result_batch", "query_id": "q1",
                         "results": [{"url": "https://a", "score": 0.5}, {"url": "https://b", "score": 0.9}]})),
            event(json!({"message_type": "complete", "query_id": "q1"})),
        ])]);
        let mut renderer = RecordingRenderer::new();

        session.start().unwrap();
        assert_eq!(session.step(&mut renderer).await, None);
        assert_eq!(session.state(), SessionState::AwaitingFirstEvent);
        assert_eq!(session.step(&mut renderer).await, None);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(
            session.step(&mut renderer).await,
            Some(SessionOutcome::Completed { result_count: 2 })
        );
        assert_eq!(session.state(), SessionState::Terminated);

        let urls: Vec<&str> = session.round().results().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
        assert_eq!(renderer.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn run_starts_idle_session() {
        let (mut session, transport) = session(vec![Script::events([event(
            json!({"message_type": "complete"}),
        )])]);
        let mut renderer = RecordingRenderer::new();
        let outcome = session.run(&mut renderer).await;
        assert!(outcome.is_insufficient());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn step_after_outcome_repeats_it() {
        let (mut session, _) = session(vec![Script::events([event(
            json!({"message_type": "complete"}),
        )])]);
        let mut renderer = RecordingRenderer::new();
        let outcome = session.run(&mut renderer).await;
        assert_eq!(session.step(&mut renderer).await, Some(outcome));
        assert_eq!(renderer.outcomes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reported_once() {
        let fail = || Script::Fail(crate::errors::TransportError::Closed);
        let (mut session, transport) = session(vec![fail(), fail(), fail(), fail()]);
        let mut renderer = RecordingRenderer::new();

        let outcome = session.run(&mut renderer).await;
        assert_eq!(outcome, SessionOutcome::Failed { retries: 3 });
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.open_count(), 4);
        assert_eq!(renderer.outcomes(), vec![&SessionOutcome::Failed { retries: 3 }]);
        assert!(session.round().is_terminated());
    }

    #[tokio::test]
    async fn cancel_invalidates_and_notifies() {
        let (mut session, _) = session(vec![Script::Hang]);
        let mut renderer = RecordingRenderer::new();
        session.start().unwrap();
        let _ = session.step(&mut renderer).await;

        assert!(session.cancel(&mut renderer));
        assert!(!session.cancel(&mut renderer));
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.outcome(), Some(&SessionOutcome::Cancelled));
        assert_eq!(renderer.outcomes(), vec![&SessionOutcome::Cancelled]);
        assert!(session.connection_state().is_stopped);

        let late = event(json!({"message_type": "result_batch", "query_id": "q1",
                                "results": [{"url": "https://late"}]}));
        assert_eq!(
            session.handle_payload(&late, &mut renderer),
            Dispatch::Dropped(DropReason::Terminated)
        );
        assert!(session.round().results().is_empty());
    }

    #[tokio::test]
    async fn mismatched_events_do_not_advance_state() {
        let (mut session, _) = session(vec![Script::Hang]);
        let mut renderer = RecordingRenderer::new();
        session.start().unwrap();
        let _ = session.step(&mut renderer).await;

        let foreign = event(json!({"message_type": "remember", "query_id": "q0", "message": "x"}));
        assert_eq!(
            session.handle_payload(&foreign, &mut renderer),
            Dispatch::Dropped(DropReason::Mismatched)
        );
        assert_eq!(session.state(), SessionState::AwaitingFirstEvent);
        assert!(session.round().is_first_event_pending());
    }
}
