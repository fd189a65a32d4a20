//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` allows partial
//! JSON: missing fields get their default during deserialization.

mod agent;
mod context;

pub use agent::*;
pub use context::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Parley agent.
///
/// Loaded from `~/.parley/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "reflection": { "interval": 4 },
///   "context": { "retrieval": { "ttl": 2, "priority": 100 } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Chat model endpoint.
    pub llm: LlmSettings,
    /// Packet policies per producer.
    pub context: ContextSettings,
    /// Reflection cadence.
    pub reflection: ReflectionSettings,
    /// Retrieval scoring.
    pub retrieval: RetrievalSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ParleySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "parley".to_string(),
            llm: LlmSettings::default(),
            context: ContextSettings::default(),
            reflection: ReflectionSettings::default(),
            retrieval: RetrievalSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ParleySettings {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.reflection.interval == 0 {
            return Err(SettingsError::InvalidValue(
                "reflection.interval must be at least 1".into(),
            ));
        }
        if self.reflection.context_window_size == 0 {
            return Err(SettingsError::InvalidValue(
                "reflection.contextWindowSize must be at least 1".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(SettingsError::InvalidValue(
                "retrieval.topK must be at least 1".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.score_threshold) {
            return Err(SettingsError::InvalidValue(format!(
                "retrieval.scoreThreshold {} is outside [-1, 1]",
                self.retrieval.score_threshold
            )));
        }
        for (name, policy) in [
            ("conversation", self.context.conversation),
            ("retrieval", self.context.retrieval),
            ("reflection", self.context.reflection),
            ("audio", self.context.audio),
        ] {
            if policy.ttl < -1 {
                return Err(SettingsError::InvalidValue(format!(
                    "context.{name}.ttl must be -1 or non-negative, got {}",
                    policy.ttl
                )));
            }
        }
        Ok(())
    }
}
