//! # Transport
//!
//! The seam between the engine and the network. A [`Transport`] opens one
//! event stream for a URL and hands back the raw `data:` payloads; the
//! connection manager owns retry policy, so implementations never retry.
//!
//! [`HttpTransport`] is the production implementation: a reqwest GET with
//! `Accept: text/event-stream`, its body framed by [`parse_sse_events`].

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use nlweb_core::QueryRequest;
use reqwest::Url;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use crate::errors::{Result, StreamError, TransportError};
use crate::sse::{SseParserOptions, parse_sse_events};

/// Boxed stream of raw event payloads returned by [`Transport::open`].
pub type RawEventStream = Pin<Box<dyn Stream<Item = std::result::Result<String, TransportError>> + Send>>;

/// Longest response body kept in a [`TransportError::Status`] message.
const MAX_ERROR_BODY: usize = 512;

/// Opens event streams.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a stream for `url`.
    ///
    /// `Ok` means the server accepted the request and the body is streaming.
    /// The returned stream ends when the server closes it.
    async fn open(&self, url: &Url) -> std::result::Result<RawEventStream, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpTransport
// ─────────────────────────────────────────────────────────────────────────────

/// reqwest-backed [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    sse: SseParserOptions,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client.
    pub fn new() -> std::result::Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Create a transport sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            sse: SseParserOptions::default(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &Url) -> std::result::Result<RawEventStream, TransportError> {
        debug!(%url, "opening event stream");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = truncate(&body, MAX_ERROR_BODY);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(parse_sse_events(response.bytes_stream(), &self.sse)))
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// URL construction
// ─────────────────────────────────────────────────────────────────────────────

/// Build the streaming URL for `request` against `endpoint`.
///
/// Query parameters already present on the endpoint are kept; the request
/// parameters are appended after them.
pub fn build_url(endpoint: &str, request: &QueryRequest) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| StreamError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(StreamError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    let pairs = request.query_pairs()?;
    let _ = url
        .query_pairs_mut()
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
    Ok(url)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
