//! # parley-settings
//!
//! Configuration management with layered sources for the Parley agent.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **User file**: `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PARLEY_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, merge_json, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<ParleySettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.parley/settings.json` with env var
/// overrides. If loading fails, logs the error and returns compiled defaults.
pub fn get_settings() -> &'static ParleySettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ParleySettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ParleySettings) -> std::result::Result<(), ParleySettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = ParleySettings::default();
        let _policy = PacketPolicy::new(-1, 0);
        assert!(settings_path().ends_with(".parley/settings.json"));
    }

    #[test]
    fn default_settings_match_documented_values() {
        let settings = ParleySettings::default();
        assert_eq!(settings.name, "parley");
        assert_eq!(settings.reflection.interval, 3);
        assert_eq!(settings.reflection.context_window_size, 10);
        assert_eq!(settings.retrieval.top_k, 3);
        assert!((settings.retrieval.score_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(settings.logging.level, "warn");
    }
}
