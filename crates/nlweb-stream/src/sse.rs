//! # SSE Parser
//!
//! Server-Sent Events framing over a chunked HTTP body.
//!
//! The parser handles:
//! - Line buffering across arbitrary chunk boundaries (`\n` and `\r\n`)
//! - `data:` field extraction, with multi-line data joined by `\n`
//! - Event dispatch on a blank line
//! - Comment lines and non-data fields (`event:`, `id:`, `retry:`) skipped
//! - `[DONE]` markers and empty payloads skipped
//! - An unterminated final event, flushed at end of body when configured
//!
//! Each yielded item is the raw payload of one event; decoding into a
//! `StreamEvent` happens in the dispatcher.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::errors::TransportError;

/// Options for the SSE parser.
#[derive(Clone, Debug)]
pub struct SseParserOptions {
    /// Whether to dispatch a final event that is not followed by a blank
    /// line when the body ends. Default: `true`.
    pub process_remaining_buffer: bool,
}

impl Default for SseParserOptions {
    fn default() -> Self {
        Self {
            process_remaining_buffer: true,
        }
    }
}

struct FrameState<S> {
    stream: Pin<Box<S>>,
    buffer: BytesMut,
    data: Option<String>,
    done: bool,
}

impl<S> FrameState<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
            buffer: BytesMut::with_capacity(8192),
            data: None,
            done: false,
        }
    }

    /// Feed one line; returns a payload when the line completes an event.
    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            }
        }
        None
    }

    fn flush(&mut self) -> Option<String> {
        let data = self.data.take()?;
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return None;
        }
        Some(data)
    }
}

/// Parse SSE events from a byte stream and yield their data payloads.
///
/// A read error is yielded once as [`TransportError::Http`] and ends the
/// stream; a partially received event is discarded in that case.
pub fn parse_sse_events<S>(
    byte_stream: S,
    options: &SseParserOptions,
) -> impl Stream<Item = Result<String, TransportError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let process_remaining = options.process_remaining_buffer;

    futures::stream::unfold(FrameState::new(byte_stream), move |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            if let Some(newline_pos) = state.buffer.iter().position(|&b| b == b'\n') {
                let mut line_bytes = state.buffer.split_to(newline_pos + 1);
                line_bytes.truncate(line_bytes.len() - 1);
                if line_bytes.last() == Some(&b'\r') {
                    line_bytes.truncate(line_bytes.len() - 1);
                }

                let Ok(line) = std::str::from_utf8(&line_bytes) else {
                    continue; // skip invalid UTF-8 lines
                };
                if let Some(data) = state.accept_line(line) {
                    return Some((Ok(data), state));
                }
                continue;
            }

            match state.stream.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    warn!(error = %e, "SSE stream read error");
                    state.done = true;
                    return Some((Err(TransportError::Http(e)), state));
                }
                None => {
                    state.done = true;
                    if !process_remaining {
                        return None;
                    }
                    if !state.buffer.is_empty() {
                        let rest = state.buffer.split();
                        if let Ok(line) = std::str::from_utf8(&rest) {
                            if let Some(data) = state.accept_line(line.trim_end_matches('\r')) {
                                return Some((Ok(data), state));
                            }
                        }
                    }
                    return state.flush().map(|data| (Ok(data), state));
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
