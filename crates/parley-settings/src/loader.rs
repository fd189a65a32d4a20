//! Layered settings loading.
//!
//! Compiled defaults, then `~/.parley/settings.json` merged over them, then
//! `PARLEY_*` environment variables, then [`ParleySettings::validate`].
//!
//! The file only needs the keys it changes. Objects merge key by key, any
//! other value replaces what it lands on, and `null` leaves the default alone.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ParleySettings;

/// `~/.parley/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".parley")
        .join("settings.json")
}

/// Load from [`settings_path`].
pub fn load_settings() -> Result<ParleySettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path`, apply environment overrides and validate.
///
/// A missing file yields the defaults. Malformed JSON and values that fail
/// validation are errors.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<ParleySettings> {
    let mut value = serde_json::to_value(ParleySettings::default())?;
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "merging settings file");
            merge_json(&mut value, serde_json::from_str(&text)?);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(serde_json::from_value(value)?)
}

/// Merge `overlay` into `base` in place.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ── Environment ─────────────────────────────────────────────────────────────

const REFLECTION_BOUNDS: RangeInclusive<usize> = 1..=1000;
const TOP_K_BOUNDS: RangeInclusive<usize> = 1..=100;

/// Apply `PARLEY_*` overrides from the process environment.
///
/// Unparseable or out-of-range numbers are ignored with a warning.
pub fn apply_env_overrides(settings: &mut ParleySettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut ParleySettings, lookup: impl Fn(&str) -> Option<String>) {
    let text = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let number = |key: &str, bounds: RangeInclusive<usize>| {
        let raw = lookup(key)?;
        let parsed = parse_bounded(&raw, &bounds);
        if parsed.is_none() {
            warn!(key, value = %raw, ?bounds, "ignoring out-of-range env override");
        }
        parsed
    };

    if let Some(v) = text("PARLEY_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = text("PARLEY_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = number("PARLEY_REFLECTION_INTERVAL", REFLECTION_BOUNDS) {
        settings.reflection.interval = v;
    }
    if let Some(v) = number("PARLEY_REFLECTION_WINDOW", REFLECTION_BOUNDS) {
        settings.reflection.context_window_size = v;
    }
    if let Some(v) = number("PARLEY_RETRIEVAL_TOP_K", TOP_K_BOUNDS) {
        settings.retrieval.top_k = v;
    }
    if let Some(v) = text("PARLEY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse `raw` as a `usize` inside `bounds`.
pub fn parse_bounded(raw: &str, bounds: &RangeInclusive<usize>) -> Option<usize> {
    raw.trim().parse().ok().filter(|n| bounds.contains(n))
}
