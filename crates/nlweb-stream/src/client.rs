//! # Chat Client
//!
//! Caller-owned conversation host. A [`ChatClient`] carries what outlives a
//! single query: configuration, the prior turns sent as `prev`, and the facts
//! the server asked to remember. It keeps at most one session active; a new
//! query cancels the previous one before its own connection opens.

use std::sync::Arc;

use nlweb_core::{QueryId, QueryRequest};
use nlweb_settings::ClientSettings;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{Result, StreamError};
use crate::renderer::{Renderer, SessionOutcome};
use crate::session::QuerySession;
use crate::transport::Transport;

/// Input to [`ChatClient::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// Ask a new query, cancelling any active one.
    Ask(String),
    /// Cancel the active query.
    Cancel,
    /// Forget prior turns and remembered facts.
    ClearHistory,
}

/// A conversation with one streaming endpoint.
pub struct ChatClient {
    settings: ClientSettings,
    transport: Arc<dyn Transport>,
    prior_turns: Vec<String>,
    items_to_remember: Vec<String>,
    last_decontextualized_query: Option<String>,
    active: Option<QuerySession>,
}

impl ChatClient {
    /// Create a client with no history.
    pub fn new(settings: ClientSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
            prior_turns: Vec::new(),
            items_to_remember: Vec::new(),
            last_decontextualized_query: None,
            active: None,
        }
    }

    /// Seed the conversation with earlier turns, oldest first.
    #[must_use]
    pub fn with_prior_turns(mut self, turns: Vec<String>) -> Self {
        self.prior_turns = turns;
        self
    }

    /// Client settings.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Queries sent so far, oldest first.
    #[must_use]
    pub fn prior_turns(&self) -> &[String] {
        &self.prior_turns
    }

    /// Facts remembered across rounds.
    #[must_use]
    pub fn items_to_remember(&self) -> &[String] {
        &self.items_to_remember
    }

    /// The server's rewrite of the most recent finished query.
    #[must_use]
    pub fn last_decontextualized_query(&self) -> Option<&str> {
        self.last_decontextualized_query.as_deref()
    }

    /// The active session, if any.
    #[must_use]
    pub fn active(&self) -> Option<&QuerySession> {
        self.active.as_ref()
    }

    /// Forget prior turns and remembered facts.
    pub fn clear_history(&mut self) {
        self.prior_turns.clear();
        self.items_to_remember.clear();
        self.last_decontextualized_query = None;
    }

    /// Cancel any active session and start one for `query`.
    pub fn begin(&mut self, query: &str, renderer: &mut dyn Renderer) -> Result<QueryId> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StreamError::EmptyQuery);
        }
        self.cancel_active(renderer);

        let request = self.build_request(query);
        let mut session = QuerySession::new(
            request,
            &self.settings.endpoint,
            self.transport.clone(),
            self.settings.retry.clone(),
        )?;
        session.start()?;

        let query_id = session.query_id().clone();
        self.prior_turns.push(query.to_owned());
        self.active = Some(session);
        Ok(query_id)
    }

    /// Step the active session once.
    ///
    /// Returns the outcome when the session ends, after folding its
    /// remembered facts into the conversation. Returns `None` immediately
    /// when no session is active.
    pub async fn next(&mut self, renderer: &mut dyn Renderer) -> Option<SessionOutcome> {
        let session = self.active.as_mut()?;
        let outcome = session.step(renderer).await?;
        if let Some(session) = self.active.take() {
            self.retire(&session);
        }
        Some(outcome)
    }

    /// Ask `query` and drive it to its outcome.
    pub async fn ask(&mut self, query: &str, renderer: &mut dyn Renderer) -> Result<SessionOutcome> {
        let _ = self.begin(query, renderer)?;
        loop {
            if let Some(outcome) = self.next(renderer).await {
                return Ok(outcome);
            }
        }
    }

    /// Cancel the active session, if any.
    ///
    /// Returns whether a session was cancelled.
    pub fn cancel_active(&mut self, renderer: &mut dyn Renderer) -> bool {
        let Some(mut session) = self.active.take() else {
            return false;
        };
        let cancelled = session.cancel(renderer);
        self.retire(&session);
        cancelled
    }

    /// Process commands while driving the active session.
    ///
    /// A new [`ClientCommand::Ask`] pre-empts the active session. When the
    /// command channel closes, the active session runs to its outcome and the
    /// loop returns.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ClientCommand>,
        renderer: &mut dyn Renderer,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ClientCommand::Ask(query)) => {
                        if let Err(e) = self.begin(&query, renderer) {
                            warn!(error = %e, "query rejected");
                        }
                    }
                    Some(ClientCommand::Cancel) => {
                        let _ = self.cancel_active(renderer);
                    }
                    Some(ClientCommand::ClearHistory) => self.clear_history(),
                    None => break,
                },
                _ = self.next(renderer), if self.active.is_some() => {}
            }
        }

        debug!("command channel closed, finishing active query");
        while self.active.is_some() {
            let _ = self.next(renderer).await;
        }
    }

    fn build_request(&self, query: &str) -> QueryRequest {
        let item_to_remember =
            (!self.items_to_remember.is_empty()).then(|| self.items_to_remember.join(","));
        QueryRequest::new(query, self.settings.generate_mode)
            .with_site(self.settings.site.clone())
            .with_prior_turns(self.prior_turns.clone())
            .with_item_to_remember(item_to_remember)
            .with_context_url(self.settings.context_url.clone())
    }

    /// Fold a finished session's round into the conversation.
    fn retire(&mut self, session: &QuerySession) {
        let round = session.round();
        self.items_to_remember
            .extend(round.items_to_remember().iter().cloned());
        if let Some(query) = round.decontextualized_query() {
            self.last_decontextualized_query = Some(query.to_owned());
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.settings.endpoint)
            .field("prior_turns", &self.prior_turns.len())
            .field("items_to_remember", &self.items_to_remember)
            .field("active", &self.active.as_ref().map(QuerySession::query_id))
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
