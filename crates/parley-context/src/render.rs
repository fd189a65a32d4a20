//! Packet → message rendering.
//!
//! | kind | content | output |
//! |------|---------|--------|
//! | `Conversation` | messages | the messages, in order |
//! | `RetrievedKnowledge`, `Reflection` | text | one `system` message |
//! | `Unknown(_)` | anything | nothing |
//!
//! Any other kind/content pairing renders nothing.

use parley_core::messages::ChatMessage;
use tracing::trace;

use crate::packet::{ContextPacket, PacketContent, PacketKind};

/// Render one packet into zero or more messages.
#[must_use]
pub fn render_packet(packet: &ContextPacket) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    render_into(packet, &mut out);
    out
}

/// Append the messages rendered from `packet` to `out`.
pub(crate) fn render_into(packet: &ContextPacket, out: &mut Vec<ChatMessage>) {
    match (packet.kind(), packet.content()) {
        (PacketKind::Conversation, PacketContent::Messages(messages)) => {
            out.extend(messages.iter().cloned());
        }
        (PacketKind::RetrievedKnowledge | PacketKind::Reflection, PacketContent::Text(text)) => {
            out.push(ChatMessage::system(text.clone()));
        }
        (PacketKind::Unknown(tag), _) => {
            trace!(kind = %tag, source = packet.source(), "skipping unknown packet kind");
        }
        (kind, _) => {
            trace!(
                kind = %kind,
                source = packet.source(),
                "content shape does not match kind, rendering nothing"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversation_splices_messages_in_order() {
        let packet = ContextPacket::conversation(
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            "memory",
            -1,
        );
        assert_eq!(
            render_packet(&packet),
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]
        );
    }

    #[test]
    fn empty_conversation_renders_nothing() {
        let packet = ContextPacket::conversation(Vec::new(), "memory", -1);
        assert!(render_packet(&packet).is_empty());
    }

    #[test]
    fn retrieved_knowledge_renders_one_system_message() {
        let packet = ContextPacket::retrieved_knowledge("S", "retriever", 1);
        assert_eq!(render_packet(&packet), vec![ChatMessage::system("S")]);
    }

    #[test]
    fn reflection_renders_one_system_message() {
        let packet = ContextPacket::reflection("S1", "reflection", 5);
        assert_eq!(render_packet(&packet), vec![ChatMessage::system("S1")]);
    }

    #[test]
    fn unknown_kind_renders_nothing() {
        let packet = ContextPacket::new("audio_state", json!({"state": "idle"}), "audio", -1);
        assert!(render_packet(&packet).is_empty());

        let text_unknown = ContextPacket::new("scratch", "some text", "notes", 2);
        assert!(render_packet(&text_unknown).is_empty());
    }

    #[test]
    fn mismatched_content_renders_nothing() {
        let text_conversation = ContextPacket::new(PacketKind::Conversation, "hi", "memory", -1);
        assert!(render_packet(&text_conversation).is_empty());

        let list_reflection = ContextPacket::new(
            PacketKind::Reflection,
            vec![ChatMessage::user("x")],
            "reflection",
            2,
        );
        assert!(render_packet(&list_reflection).is_empty());
    }

    #[test]
    fn empty_text_still_renders_one_message() {
        let packet = ContextPacket::retrieved_knowledge("", "retriever", 1);
        assert_eq!(render_packet(&packet), vec![ChatMessage::system("")]);
    }
}
