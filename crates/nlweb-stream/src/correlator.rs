//! Query correlation.
//!
//! A [`SessionCorrelator`] binds one [`QueryId`] to one [`ConnectionManager`].
//! Events stamped with a different ID (a stale stream, or cross-talk from a
//! shared backend) are dropped before they reach the round. Events without
//! an ID are accepted unconditionally; servers that omit the field still
//! work, at the cost of no protection against cross-talk.

use nlweb_core::QueryId;
use reqwest::Url;
use tracing::debug;

use crate::connection::{ConnectionEvent, ConnectionManager};

/// How an event's `query_id` relates to the active query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correlation {
    /// The event carries the active ID.
    Matched,
    /// The event carries no ID.
    Uncorrelated,
    /// The event carries another ID, or the correlator was invalidated.
    Mismatched,
}

impl Correlation {
    /// Whether the event may be processed.
    #[must_use]
    pub fn accepts(self) -> bool {
        !matches!(self, Self::Mismatched)
    }
}

/// The connection for exactly one logical query.
#[derive(Debug)]
pub struct SessionCorrelator {
    query_id: QueryId,
    active: bool,
    connection: ConnectionManager,
}

impl SessionCorrelator {
    /// Bind `query_id` to `connection`.
    pub fn new(query_id: QueryId, connection: ConnectionManager) -> Self {
        Self {
            query_id,
            active: true,
            connection,
        }
    }

    /// The active query ID.
    #[must_use]
    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    /// Whether the ID is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Start streaming from `url`.
    pub fn start(&mut self, url: Url) {
        self.connection.open(url);
    }

    /// Classify an event's `query_id`.
    #[must_use]
    pub fn correlate(&self, event_query_id: Option<&str>) -> Correlation {
        if !self.active {
            return Correlation::Mismatched;
        }
        match event_query_id {
            None => Correlation::Uncorrelated,
            Some(id) if id == self.query_id.as_str() => Correlation::Matched,
            Some(_) => Correlation::Mismatched,
        }
    }

    /// Close the connection and retire the ID; every later event mismatches.
    pub fn invalidate(&mut self) {
        if self.active {
            debug!(query_id = %self.query_id, "query id invalidated");
        }
        self.active = false;
        self.connection.close();
    }

    /// Close the connection, keeping the ID active.
    pub fn close(&mut self) {
        self.connection.close();
    }

    /// Pull the next connection event.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        self.connection.next_event().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
