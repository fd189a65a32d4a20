//! Conversation memory.
//!
//! [`ConversationMemory`] is the append-only dialogue history. Each turn the
//! driver snapshots it into a fresh Conversation packet and swaps it in with
//! `replace_by_source`, so the controller never holds two copies.

use parley_context::ContextPacket;
use parley_core::messages::{ChatMessage, Role};
use parley_settings::PacketPolicy;

/// Source tag on conversation packets.
pub const MEMORY_SOURCE: &str = "memory";

/// In-memory dialogue history.
#[derive(Clone, Debug, Default)]
pub struct ConversationMemory {
    history: Vec<ChatMessage>,
}

impl ConversationMemory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn add(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(ChatMessage::new(role, content));
    }

    /// Copy of the full history.
    #[must_use]
    pub fn get(&self) -> Vec<ChatMessage> {
        self.history.clone()
    }

    /// History filtered to `roles` (all roles when `None`), then trimmed to
    /// the last `last_n` messages (all when `None`).
    #[must_use]
    pub fn messages(&self, roles: Option<&[Role]>, last_n: Option<usize>) -> Vec<ChatMessage> {
        let filtered: Vec<&ChatMessage> = self
            .history
            .iter()
            .filter(|m| roles.is_none_or(|r| r.contains(&m.role)))
            .collect();
        let skip = last_n.map_or(0, |n| filtered.len().saturating_sub(n));
        filtered.into_iter().skip(skip).cloned().collect()
    }

    #[must_use]
    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    /// Whether nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Snapshot the dialogue (user and assistant turns) as a Conversation packet.
    #[must_use]
    pub fn to_packet(&self, policy: PacketPolicy) -> ContextPacket {
        let dialogue = self.messages(Some(&[Role::User, Role::Assistant]), None);
        ContextPacket::conversation(dialogue, MEMORY_SOURCE, policy.ttl)
            .with_priority(policy.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_context::{PacketContent, PacketKind, Ttl};

    fn sample() -> ConversationMemory {
        let mut memory = ConversationMemory::new();
        memory.add(Role::User, "one");
        memory.add(Role::Assistant, "two");
        memory.add(Role::System, "note");
        memory.add(Role::User, "three");
        memory
    }

    #[test]
    fn add_preserves_order() {
        let memory = sample();
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.get()[0], ChatMessage::user("one"));
        assert_eq!(memory.get()[3], ChatMessage::user("three"));
    }

    #[test]
    fn messages_without_filters_returns_everything() {
        assert_eq!(sample().messages(None, None), sample().get());
    }

    #[test]
    fn messages_filters_roles() {
        let dialogue = sample().messages(Some(&[Role::User, Role::Assistant]), None);
        assert_eq!(dialogue.len(), 3);
        assert!(dialogue.iter().all(|m| !m.is_system()));
    }

    #[test]
    fn messages_trims_after_filtering() {
        let last = sample().messages(Some(&[Role::User]), Some(1));
        assert_eq!(last, vec![ChatMessage::user("three")]);
    }

    #[test]
    fn last_n_larger_than_history_returns_all() {
        assert_eq!(sample().messages(None, Some(100)).len(), 4);
    }

    #[test]
    fn last_n_zero_returns_nothing() {
        assert!(sample().messages(None, Some(0)).is_empty());
    }

    #[test]
    fn to_packet_uses_policy_and_drops_system_notes() {
        let packet = sample().to_packet(PacketPolicy::new(-1, 50));
        assert_eq!(packet.kind(), &PacketKind::Conversation);
        assert_eq!(packet.source(), MEMORY_SOURCE);
        assert_eq!(packet.ttl(), Ttl::Persistent);
        assert_eq!(packet.priority(), 50);
        let PacketContent::Messages(messages) = packet.content() else {
            panic!("conversation packet should carry messages");
        };
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn empty_memory_makes_empty_packet() {
        let packet = ConversationMemory::new().to_packet(PacketPolicy::new(-1, 50));
        assert_eq!(packet.content(), &PacketContent::Messages(Vec::new()));
    }
}
