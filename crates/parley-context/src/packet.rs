//! Context packets.
//!
//! A [`ContextPacket`] is one unit of context with an explicit lifetime
//! ([`Ttl`]) and a render priority. Everything except the countdown is fixed
//! at construction; the countdown only moves through [`ContextPacket::step`],
//! which the controller calls once per turn.

use std::fmt;

use parley_core::messages::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    PERSISTENT_TTL, TAG_CONVERSATION, TAG_REFLECTION, TAG_RETRIEVED_KNOWLEDGE,
};

// ─────────────────────────────────────────────────────────────────────────────
// PacketKind
// ─────────────────────────────────────────────────────────────────────────────

/// What a packet holds, which decides how it renders.
///
/// Tags outside the known set are kept verbatim in [`PacketKind::Unknown`]
/// so producers can attach state the renderer deliberately skips.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PacketKind {
    /// Dialogue history; content is a message sequence.
    Conversation,
    /// Retrieval results; content is a citation block.
    RetrievedKnowledge,
    /// Reflection summary; content is short text.
    Reflection,
    /// Any other tag. Never rendered.
    Unknown(String),
}

impl PacketKind {
    /// Parse a wire tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            TAG_CONVERSATION => Self::Conversation,
            TAG_RETRIEVED_KNOWLEDGE => Self::RetrievedKnowledge,
            TAG_REFLECTION => Self::Reflection,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Wire tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Conversation => TAG_CONVERSATION,
            Self::RetrievedKnowledge => TAG_RETRIEVED_KNOWLEDGE,
            Self::Reflection => TAG_REFLECTION,
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for PacketKind {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl From<String> for PacketKind {
    fn from(tag: String) -> Self {
        match Self::from_tag(&tag) {
            Self::Unknown(_) => Self::Unknown(tag),
            known => known,
        }
    }
}

impl From<PacketKind> for String {
    fn from(kind: PacketKind) -> Self {
        match kind {
            PacketKind::Unknown(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ttl
// ─────────────────────────────────────────────────────────────────────────────

/// Remaining lifetime of a packet, counted in turns.
///
/// The raw projection is a signed integer: `-1` for [`Ttl::Persistent`],
/// otherwise the remaining turn count. `Turns(0)` means expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Ttl {
    /// Never expires on its own.
    Persistent,
    /// Expires when the count reaches zero.
    Turns(u32),
}

impl Ttl {
    /// Build from the raw signed form. Any negative value is persistent.
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        u32::try_from(raw).map_or(Self::Persistent, Self::Turns)
    }

    /// Raw signed form: `-1` for persistent, else the remaining turns.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Persistent => PERSISTENT_TTL,
            Self::Turns(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }

    /// Count down one turn. Saturates at zero; persistent is untouched.
    pub fn step(&mut self) {
        if let Self::Turns(n) = self {
            *n = n.saturating_sub(1);
        }
    }

    /// Whether the countdown has reached zero.
    #[must_use]
    pub fn is_expired(self) -> bool {
        self == Self::Turns(0)
    }

    /// Whether this is the persistent sentinel.
    #[must_use]
    pub fn is_persistent(self) -> bool {
        self == Self::Persistent
    }
}

impl From<i32> for Ttl {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Ttl> for i32 {
    fn from(ttl: Ttl) -> Self {
        ttl.as_raw()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PacketContent
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of a packet. Its shape is expected to match the packet's kind,
/// but nothing checks that; a mismatch renders nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketContent {
    /// Ordered role/content records.
    Messages(Vec<ChatMessage>),
    /// Opaque text blob.
    Text(String),
    /// Anything else.
    Json(Value),
}

impl From<Vec<ChatMessage>> for PacketContent {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self::Messages(messages)
    }
}

impl From<String> for PacketContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PacketContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for PacketContent {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ContextPacket
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of context with an explicit lifetime and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPacket {
    kind: PacketKind,
    content: PacketContent,
    source: String,
    ttl: Ttl,
    priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl ContextPacket {
    /// Create a packet with priority `0` and no metadata.
    ///
    /// `ttl` uses the raw signed form; values below `-1` are treated as
    /// persistent and logged.
    pub fn new(
        kind: impl Into<PacketKind>,
        content: impl Into<PacketContent>,
        source: impl Into<String>,
        ttl: i32,
    ) -> Self {
        let source = source.into();
        if ttl < PERSISTENT_TTL {
            tracing::warn!(source = %source, ttl, "negative ttl treated as persistent");
        }
        Self {
            kind: kind.into(),
            content: content.into(),
            source,
            ttl: Ttl::from_raw(ttl),
            priority: 0,
            metadata: None,
        }
    }

    /// Conversation packet holding a message sequence.
    pub fn conversation(
        messages: Vec<ChatMessage>,
        source: impl Into<String>,
        ttl: i32,
    ) -> Self {
        Self::new(PacketKind::Conversation, messages, source, ttl)
    }

    /// Retrieved-knowledge packet holding a citation block.
    pub fn retrieved_knowledge(
        text: impl Into<String>,
        source: impl Into<String>,
        ttl: i32,
    ) -> Self {
        Self::new(PacketKind::RetrievedKnowledge, text.into(), source, ttl)
    }

    /// Reflection packet holding a summary.
    pub fn reflection(text: impl Into<String>, source: impl Into<String>, ttl: i32) -> Self {
        Self::new(PacketKind::Reflection, text.into(), source, ttl)
    }

    /// Set the render priority (higher renders earlier).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach auxiliary state. The controller never reads it.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    /// Packet kind.
    pub fn kind(&self) -> &PacketKind {
        &self.kind
    }

    #[must_use]
    /// Packet payload.
    pub fn content(&self) -> &PacketContent {
        &self.content
    }

    #[must_use]
    /// Provenance tag.
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    /// Remaining lifetime.
    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    #[must_use]
    /// Render priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    /// Auxiliary state, if any.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Advance one turn: decrement a positive countdown, otherwise no-op.
    pub fn step(&mut self) {
        self.ttl.step();
    }

    #[must_use]
    /// Whether the countdown is at zero.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_expired()
    }

    #[must_use]
    /// Whether the packet never expires on its own.
    pub fn is_persistent(&self) -> bool {
        self.ttl.is_persistent()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
