//! # nlweb-core
//!
//! Foundation types and utilities for the nlweb streaming query client.
//!
//! This crate provides the shared vocabulary that the engine and its hosts
//! depend on:
//!
//! - **Query IDs**: [`QueryId`] newtype, generated client-side per request
//! - **Requests**: [`QueryRequest`] and [`GenerateMode`], plus the outbound
//!   query-parameter encoding
//! - **Wire events**: [`StreamEvent`] envelope over the closed
//!   [`StreamMessage`] enum, [`ResultItem`], [`MessageContent`]
//! - **Backoff**: [`RetryConfig`] and the pure [`RetryDecision`] policy
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod logging;
pub mod request;
pub mod retry;

pub use events::{MessageContent, ResultItem, StreamEvent, StreamMessage};
pub use ids::QueryId;
pub use request::{GenerateMode, QueryRequest};
pub use retry::{RetryConfig, RetryDecision};
