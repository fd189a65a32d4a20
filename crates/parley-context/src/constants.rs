//! Context packet constants.

// =============================================================================
// Kind tags
// =============================================================================

/// Wire tag for [`PacketKind::Conversation`](crate::PacketKind::Conversation).
pub const TAG_CONVERSATION: &str = "conversation";

/// Wire tag for [`PacketKind::RetrievedKnowledge`](crate::PacketKind::RetrievedKnowledge).
pub const TAG_RETRIEVED_KNOWLEDGE: &str = "retrieved_knowledge";

/// Wire tag for [`PacketKind::Reflection`](crate::PacketKind::Reflection).
pub const TAG_REFLECTION: &str = "reflection";

// =============================================================================
// Lifetime
// =============================================================================

/// Raw ttl of a packet that never expires on its own.
pub const PERSISTENT_TTL: i32 = -1;
