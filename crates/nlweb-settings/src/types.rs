//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file may contain any subset of fields.

use nlweb_core::logging::LogFormat;
use nlweb_core::{GenerateMode, RetryConfig};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default streaming endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/ask";

/// Upper bound for `retry.maxRetries`.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Upper bound for `retry.maxDelayMs` (one hour).
pub const MAX_DELAY_LIMIT_MS: u64 = 3_600_000;

/// Root settings for the streaming client.
///
/// # JSON Format
///
/// ```json
/// {
///   "endpoint": "https://search.example.com/ask",
///   "site": "seriouseats",
///   "generateMode": "summarize",
///   "retry": { "maxRetries": 5 },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Streaming `/ask` endpoint URL.
    pub endpoint: String,
    /// Site to restrict queries to; `None` searches all sites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Answer shape requested from the server.
    pub generate_mode: GenerateMode,
    /// Page URL sent as query context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
    /// Reconnect backoff bounds.
    pub retry: RetryConfig,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            site: None,
            generate_mode: GenerateMode::List,
            context_url: None,
            retry: RetryConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Check values that deserialization cannot.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(SettingsError::InvalidValue(format!(
                "retry.maxRetries ({}) exceeds {MAX_RETRIES_LIMIT}",
                self.retry.max_retries
            )));
        }
        if self.retry.max_delay_ms > MAX_DELAY_LIMIT_MS {
            return Err(SettingsError::InvalidValue(format!(
                "retry.maxDelayMs ({}) exceeds {MAX_DELAY_LIMIT_MS}",
                self.retry.max_delay_ms
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "retry.baseDelayMs ({}) exceeds retry.maxDelayMs ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ClientSettings::default();
        assert_eq!(s.endpoint, "http://localhost:8000/ask");
        assert_eq!(s.generate_mode, GenerateMode::List);
        assert_eq!(s.retry.max_retries, 3);
        assert_eq!(s.logging.level, "warn");
        assert!(s.site.is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ClientSettings =
            serde_json::from_str(r#"{"site":"imdb","retry":{"maxRetries":1}}"#).unwrap();
        assert_eq!(s.site.as_deref(), Some("imdb"));
        assert_eq!(s.retry.max_retries, 1);
        assert_eq!(s.retry.max_delay_ms, 10_000);
        assert_eq!(s.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn serializes_camel_case_and_skips_unset() {
        let json = serde_json::to_value(ClientSettings::default()).unwrap();
        assert_eq!(json["generateMode"], "list");
        assert_eq!(json["retry"]["maxRetries"], 3);
        assert!(json.get("site").is_none());
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let s = ClientSettings {
            endpoint: "  ".into(),
            ..ClientSettings::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_unbounded_retry_settings() {
        let mut s = ClientSettings::default();
        s.retry.max_retries = MAX_RETRIES_LIMIT + 1;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));

        let mut s = ClientSettings::default();
        s.retry.max_delay_ms = u64::MAX;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));

        let mut s = ClientSettings::default();
        s.retry.max_retries = MAX_RETRIES_LIMIT;
        s.retry.max_delay_ms = MAX_DELAY_LIMIT_MS;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let mut s = ClientSettings::default();
        s.retry.base_delay_ms = 20_000;
        assert!(s.validate().is_err());
    }
}
