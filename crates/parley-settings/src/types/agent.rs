//! Agent runtime settings: model, reflection cadence, retrieval, logging.

use serde::{Deserialize, Serialize};

/// Model endpoint used by the chat collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Model identifier sent with every request.
    pub model: String,
    /// OpenAI-compatible base URL.
    pub base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "moonshotai/Kimi-K2-Instruct-0905".to_string(),
            base_url: "https://router.huggingface.co/v1".to_string(),
        }
    }
}

/// Reflection summary cadence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectionSettings {
    /// Reflect whenever the history length is a multiple of this.
    pub interval: usize,
    /// Number of most recent messages fed to the summarizer.
    pub context_window_size: usize,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            interval: 3,
            context_window_size: 10,
        }
    }
}

/// Embedding retrieval settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Maximum number of cited sources.
    pub top_k: usize,
    /// Minimum cosine similarity for a document to be cited.
    pub score_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            score_threshold: 0.6,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
