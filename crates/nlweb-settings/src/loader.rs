//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If `~/.nlweb/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `NLWEB_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use nlweb_core::GenerateMode;
use nlweb_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{ClientSettings, MAX_RETRIES_LIMIT};

/// Resolve the path to the settings file (`~/.nlweb/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".nlweb").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `env`.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<ClientSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(ClientSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClientSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `env`.
///
/// Invalid values are ignored with a warning, keeping the file/default value.
///
/// | Variable | Field |
/// |----------|-------|
/// | `NLWEB_ENDPOINT` | `endpoint` |
/// | `NLWEB_SITE` | `site` |
/// | `NLWEB_GENERATE_MODE` | `generateMode` |
/// | `NLWEB_CONTEXT_URL` | `contextUrl` |
/// | `NLWEB_MAX_RETRIES` | `retry.maxRetries` (0–20) |
/// | `NLWEB_LOG_LEVEL` | `logging.level` |
/// | `NLWEB_LOG_FORMAT` | `logging.format` |
pub fn apply_env_overrides<F>(settings: &mut ClientSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = read("NLWEB_ENDPOINT") {
        settings.endpoint = v;
    }
    if let Some(v) = read("NLWEB_SITE") {
        settings.site = Some(v);
    }
    if let Some(v) = read("NLWEB_GENERATE_MODE") {
        match v.parse::<GenerateMode>() {
            Ok(mode) => settings.generate_mode = mode,
            Err(e) => tracing::warn!(key = "NLWEB_GENERATE_MODE", error = %e, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("NLWEB_CONTEXT_URL") {
        settings.context_url = Some(v);
    }
    if let Some(v) = read("NLWEB_MAX_RETRIES") {
        match parse_u32_range(&v, 0, MAX_RETRIES_LIMIT) {
            Some(n) => settings.retry.max_retries = n,
            None => tracing::warn!(key = "NLWEB_MAX_RETRIES", value = %v, "invalid u32 env var, ignoring"),
        }
    }
    if let Some(v) = read("NLWEB_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("NLWEB_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(e) => tracing::warn!(key = "NLWEB_LOG_FORMAT", error = %e, "invalid env var, ignoring"),
        }
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"retry": {"maxRetries": 3, "baseDelayMs": 1000}});
        let source = serde_json::json!({"retry": {"maxRetries": 5}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["retry"]["maxRetries"], 5);
        assert_eq!(merged["retry"]["baseDelayMs"], 1000);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_with_env ───────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"endpoint": "https://search.example.com/ask", "retry": {"maxRetries": 5}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.endpoint, "https://search.example.com/ask");
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.base_delay_ms, 1000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_invalid_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"endpoint": ""}"#).unwrap();

        let result = load_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn load_rejects_huge_retry_delay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"retry": {"maxRetries": 20, "maxDelayMs": 18446744073709551615}}"#,
        )
        .unwrap();

        let result = load_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"site": "imdb", "generateMode": "list"}"#).unwrap();

        let env = env_from(&[
            ("NLWEB_SITE", "zillow"),
            ("NLWEB_GENERATE_MODE", "summarize"),
            ("NLWEB_MAX_RETRIES", "7"),
            ("NLWEB_LOG_LEVEL", "debug"),
            ("NLWEB_LOG_FORMAT", "json"),
        ]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.site.as_deref(), Some("zillow"));
        assert_eq!(settings.generate_mode, GenerateMode::Summarize);
        assert_eq!(settings.retry.max_retries, 7);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    // ── apply_env_overrides ─────────────────────────────────────────

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = ClientSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("NLWEB_GENERATE_MODE", "rank"),
                ("NLWEB_MAX_RETRIES", "500"),
                ("NLWEB_LOG_FORMAT", "xml"),
            ]),
        );
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut settings = ClientSettings::default();
        apply_env_overrides(&mut settings, env_from(&[("NLWEB_ENDPOINT", "")]));
        assert_eq!(settings.endpoint, ClientSettings::default().endpoint);
    }

    #[test]
    fn endpoint_and_context_url_override() {
        let mut settings = ClientSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("NLWEB_ENDPOINT", "http://127.0.0.1:9000/ask"),
                ("NLWEB_CONTEXT_URL", "https://example.com"),
            ]),
        );
        assert_eq!(settings.endpoint, "http://127.0.0.1:9000/ask");
        assert_eq!(settings.context_url.as_deref(), Some("https://example.com"));
    }

    // ── parse_u32_range ─────────────────────────────────────────────

    #[test]
    fn parse_u32_range_bounds() {
        assert_eq!(parse_u32_range("0", 0, 20), Some(0));
        assert_eq!(parse_u32_range("20", 0, 20), Some(20));
        assert_eq!(parse_u32_range("21", 0, 20), None);
        assert_eq!(parse_u32_range("-1", 0, 20), None);
        assert_eq!(parse_u32_range("abc", 0, 20), None);
    }
}
