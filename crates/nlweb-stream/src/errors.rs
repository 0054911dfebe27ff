//! Error types for the streaming engine.
//!
//! [`TransportError`] covers everything that can go wrong on the wire; the
//! connection manager absorbs these into retries and only surfaces the final
//! exhaustion. [`StreamError`] covers caller mistakes when building or driving
//! a session.

use thiserror::Error;

/// A connection attempt or an open stream failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request or body read failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// Server ended the event stream.
    #[error("event stream closed by server")]
    Closed,

    /// Any other transport failure.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl TransportError {
    /// Short category string for structured logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_connect() => "connect",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http",
            Self::Status { status, .. } if *status >= 500 => "server",
            Self::Status { .. } => "status",
            Self::Closed => "closed",
            Self::Other { .. } => "other",
        }
    }
}

/// Errors returned to callers of the session API.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The configured endpoint is not a usable URL.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Parser message.
        message: String,
    },

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The query text was empty.
    #[error("query must not be empty")]
    EmptyQuery,

    /// An operation was called in a state that does not allow it.
    #[error("session is {state}, expected {expected}")]
    InvalidState {
        /// Current state name.
        state: &'static str,
        /// State the operation requires.
        expected: &'static str,
    },

    /// A transport failure surfaced directly to the caller.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, StreamError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
