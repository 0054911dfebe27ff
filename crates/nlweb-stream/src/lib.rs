//! # nlweb-stream
//!
//! The streaming query session engine.
//!
//! A query is sent as a single GET request whose response is a long-lived
//! Server-Sent Events body. This crate turns that body into rendered,
//! ordered results:
//!
//! - [`sse`]: SSE framing over a chunked byte stream
//! - [`transport`]: the [`Transport`] seam and the reqwest-backed
//!   [`HttpTransport`]
//! - [`connection`]: [`ConnectionManager`], one connection with bounded
//!   exponential-backoff reconnects
//! - [`correlator`]: [`SessionCorrelator`], drops events that belong to a
//!   different query
//! - [`dispatcher`]: [`MessageDispatcher`], routes each decoded event to its
//!   effect on the round
//! - [`accumulator`]: [`RoundState`], results plus annotation slots and the
//!   score resort
//! - [`session`]: [`QuerySession`], the per-query state machine
//! - [`client`]: [`ChatClient`], the conversation host that keeps prior turns
//!   and guarantees one active session
//!
//! Presentation lives behind the [`Renderer`] trait; the engine never builds
//! markup.

#![deny(unsafe_code)]

pub mod accumulator;
pub mod client;
pub mod connection;
pub mod correlator;
pub mod dispatcher;
pub mod errors;
pub mod renderer;
pub mod session;
pub mod sse;
pub mod test_utils;
pub mod transport;

pub use accumulator::{Annotation, AnnotationKind, PresentedBlock, RoundState};
pub use client::{ChatClient, ClientCommand};
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use correlator::{Correlation, SessionCorrelator};
pub use dispatcher::{Dispatch, DropReason, MessageDispatcher};
pub use errors::{Result, StreamError, TransportError};
pub use renderer::{RecordingRenderer, RenderRecord, RenderedBlock, Renderer, SessionOutcome};
pub use session::{QuerySession, SessionState};
pub use transport::{HttpTransport, RawEventStream, Transport, build_url};
