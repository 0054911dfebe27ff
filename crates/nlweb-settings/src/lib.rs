//! # nlweb-settings
//!
//! Layered configuration for the nlweb streaming client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.nlweb/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `NLWEB_*` overrides (highest priority)
//!
//! Hosts apply their own command-line overrides on top of the loaded value.
//! The streaming engine never reads configuration itself; it receives the
//! endpoint, site, generate mode and retry bounds from these settings.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_with_env,
    settings_path,
};
pub use types::{ClientSettings, LoggingSettings, MAX_DELAY_LIMIT_MS, MAX_RETRIES_LIMIT};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
