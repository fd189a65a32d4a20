//! Agent error types.
//!
//! Only failures the caller can act on surface here. Producers that come up
//! empty (no relevant documents, blank summary, unparseable plan) degrade
//! and log instead.

use thiserror::Error;

/// Failure reported by a [`ChatModel`](crate::llm::ChatModel).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request did not complete.
    #[error("model request failed: {0}")]
    Request(String),
    /// The model answered with no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Errors from running a turn or one of its producers.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Chat model failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Embedding backend failure.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Tool execution failure.
    #[error("tool `{name}` failed: {message}")]
    Tool {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },
}

/// Result alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
