//! Reconnect configuration and backoff policy.
//!
//! Portable, timer-free building blocks for the connection manager's
//! reconnect loop:
//!
//! - [`RetryConfig`]: retry ceiling and backoff bounds
//! - [`calculate_backoff_delay`]: capped exponential backoff
//! - [`RetryConfig::decide`]: given the current retry count, either the next
//!   attempt and its delay, or stop
//!
//! The async waiting lives in `nlweb-stream`, which owns the tokio timers.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum consecutive reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Configuration for reconnect backoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum consecutive reconnect attempts (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in ms (default: 10000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// What to do after a transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reconnect after waiting.
    Retry {
        /// One-based attempt number; becomes the new retry count.
        attempt: u32,
        /// Delay before reconnecting, in ms.
        delay_ms: u64,
    },
    /// Ceiling reached; stop permanently.
    Stop,
}

impl RetryConfig {
    /// Decide the next step given the number of retries already made.
    ///
    /// The attempt counter is incremented before the delay is computed, so
    /// with the defaults the first three failures wait 2000, 4000 and
    /// 8000 ms, and the fourth stops.
    #[must_use]
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            return RetryDecision::Stop;
        }
        let attempt = retry_count + 1;
        RetryDecision::Retry {
            attempt,
            delay_ms: calculate_backoff_delay(attempt, self.base_delay_ms, self.max_delay_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Capped exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
///
/// Saturates instead of overflowing for large attempt numbers.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(63));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
