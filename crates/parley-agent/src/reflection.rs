//! Reflection summaries.
//!
//! Every `interval` messages the driver asks the model to summarize the
//! recent conversation. The summary is requested as an ordinary user task
//! rather than a system prompt so instruction-tuned models answer it
//! directly. The result becomes a multi-turn Reflection packet.

use std::fmt::Write as _;

use parley_context::ContextPacket;
use parley_core::messages::ChatMessage;
use parley_settings::{PacketPolicy, ReflectionSettings};
use tracing::{debug, info};

use crate::errors::Result;
use crate::llm::ChatModel;

/// Source tag on reflection packets.
pub const REFLECTION_SOURCE: &str = "reflection";

/// Instruction placed above the flattened transcript.
pub const REFLECTION_INSTRUCTION: &str = "Summarize the following conversation in 2-4 sentences. \
Focus on key questions, answers, and any tool usage. \
Highlight important concepts or patterns.";

/// Periodic conversation summarizer.
#[derive(Clone, Debug)]
pub struct Reflector {
    interval: usize,
    context_window_size: usize,
}

impl Reflector {
    /// Reflect every `interval` messages over the last `context_window_size`.
    /// Zero values are raised to one.
    #[must_use]
    pub fn new(interval: usize, context_window_size: usize) -> Self {
        Self {
            interval: interval.max(1),
            context_window_size: context_window_size.max(1),
        }
    }

    /// Build from settings.
    #[must_use]
    pub fn from_settings(settings: &ReflectionSettings) -> Self {
        Self::new(settings.interval, settings.context_window_size)
    }

    /// Whether a history of `message_count` messages is due for a summary.
    ///
    /// Summaries live in packets, not in the history, and the driver records
    /// two messages per turn. With an odd `interval` a summary therefore
    /// lands every `interval` turns (at 6, 12, ... messages for 3); with an
    /// even one, every `interval / 2` turns.
    #[must_use]
    pub fn is_due(&self, message_count: usize) -> bool {
        message_count > 0 && message_count % self.interval == 0
    }

    /// Summarization prompt over the most recent messages, or `None` when
    /// there is nothing to summarize.
    #[must_use]
    pub fn build_prompt(&self, messages: &[ChatMessage]) -> Option<String> {
        if messages.is_empty() {
            return None;
        }
        let start = messages.len().saturating_sub(self.context_window_size);
        let mut prompt = format!("{REFLECTION_INSTRUCTION}\n\n");
        for (i, message) in messages[start..].iter().enumerate() {
            if i > 0 {
                prompt.push('\n');
            }
            let _ = write!(
                prompt,
                "{}: {}",
                message.role.as_str().to_uppercase(),
                message.content
            );
        }
        Some(prompt)
    }

    /// Ask `model` for a summary. Returns `None` for an empty history or a
    /// blank reply.
    pub async fn reflect(
        &self,
        model: &dyn ChatModel,
        messages: &[ChatMessage],
    ) -> Result<Option<String>> {
        let Some(prompt) = self.build_prompt(messages) else {
            debug!("no messages to reflect on");
            return Ok(None);
        };

        let reply = model.generate(&[ChatMessage::user(prompt)]).await?;
        let summary = reply.trim();
        if summary.is_empty() {
            debug!(model = model.model(), "reflection came back blank");
            return Ok(None);
        }

        info!(chars = summary.len(), "reflection summary generated");
        Ok(Some(summary.to_owned()))
    }
}

impl Default for Reflector {
    fn default() -> Self {
        Self::from_settings(&ReflectionSettings::default())
    }
}

/// Wrap a summary as a Reflection packet.
#[must_use]
pub fn to_packet(summary: impl Into<String>, policy: PacketPolicy) -> ContextPacket {
    ContextPacket::reflection(summary, REFLECTION_SOURCE, policy.ttl).with_priority(policy.priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentError, ProviderError};
    use crate::llm::testing::ScriptedModel;
    use assert_matches::assert_matches;
    use parley_context::{PacketKind, Ttl};
    use parley_core::messages::Role;

    fn history(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ChatMessage::new(role, format!("m{i}"))
            })
            .collect()
    }

    // -- is_due --

    #[test]
    fn due_on_multiples_of_interval() {
        let reflector = Reflector::new(3, 10);
        assert!(!reflector.is_due(0));
        assert!(!reflector.is_due(2));
        assert!(reflector.is_due(3));
        assert!(!reflector.is_due(4));
        assert!(reflector.is_due(6));
    }

    #[test]
    fn two_message_turns_with_interval_three_reflect_every_third_turn() {
        let reflector = Reflector::new(3, 10);
        let due_turns: Vec<usize> = (1..=9).filter(|turn| reflector.is_due(turn * 2)).collect();
        assert_eq!(due_turns, vec![3, 6, 9]);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let reflector = Reflector::new(0, 0);
        assert!(reflector.is_due(1));
        assert!(reflector.build_prompt(&history(3)).unwrap().ends_with("USER: m2"));
    }

    // -- build_prompt --

    #[test]
    fn prompt_flattens_roles_upper_case() {
        let prompt = Reflector::new(3, 10).build_prompt(&history(2)).unwrap();
        assert!(prompt.starts_with(REFLECTION_INSTRUCTION));
        assert!(prompt.ends_with("\n\nUSER: m0\nASSISTANT: m1"));
    }

    #[test]
    fn prompt_keeps_only_the_window() {
        let prompt = Reflector::new(3, 2).build_prompt(&history(5)).unwrap();
        assert!(!prompt.contains("m2"));
        assert!(prompt.contains("ASSISTANT: m3\nUSER: m4"));
    }

    #[test]
    fn empty_history_has_no_prompt() {
        assert!(Reflector::default().build_prompt(&[]).is_none());
    }

    // -- reflect --

    #[tokio::test]
    async fn reflect_sends_single_user_message_and_trims() {
        let model = ScriptedModel::new(vec!["  The user asked about Rust.  \n"]);
        let summary = Reflector::new(3, 10)
            .reflect(&model, &history(3))
            .await
            .unwrap();

        assert_eq!(summary.as_deref(), Some("The user asked about Rust."));
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 1);
        assert!(requests[0][0].is_user());
    }

    #[tokio::test]
    async fn reflect_on_empty_history_skips_model() {
        let model = ScriptedModel::new(vec!["unused"]);
        let summary = Reflector::default().reflect(&model, &[]).await.unwrap();
        assert!(summary.is_none());
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn blank_reply_is_none() {
        let model = ScriptedModel::new(vec!["   "]);
        let summary = Reflector::default().reflect(&model, &history(1)).await.unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let model = ScriptedModel::failing();
        let err = Reflector::default()
            .reflect(&model, &history(1))
            .await
            .unwrap_err();
        assert_matches!(err, AgentError::Provider(ProviderError::Request(_)));
    }

    // -- to_packet --

    #[test]
    fn to_packet_uses_policy() {
        let packet = to_packet("S1", PacketPolicy::new(3, 0));
        assert_eq!(packet.kind(), &PacketKind::Reflection);
        assert_eq!(packet.source(), REFLECTION_SOURCE);
        assert_eq!(packet.ttl(), Ttl::Turns(3));
        assert_eq!(packet.priority(), 0);
    }
}
