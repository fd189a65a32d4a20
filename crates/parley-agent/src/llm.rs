//! Chat model seam.
//!
//! The agent never talks HTTP itself. Whatever serves completions
//! (an OpenAI-compatible endpoint, a local model, a test double) implements
//! [`ChatModel`] and receives the assembled message list verbatim.

use async_trait::async_trait;
use parley_core::messages::ChatMessage;

use crate::errors::ProviderError;

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Produce the assistant reply for `messages`.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
