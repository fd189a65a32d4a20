//! Context packet settings.
//!
//! One [`PacketPolicy`] per producer decides how long its packets live and
//! where they render in the assembled prompt.

use serde::{Deserialize, Serialize};

/// Lifetime and ordering for packets from one producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketPolicy {
    /// Turns of validity; `-1` keeps the packet until it is replaced.
    pub ttl: i32,
    /// Higher renders earlier.
    pub priority: i32,
}

impl PacketPolicy {
    /// Build a policy from a ttl and a priority.
    #[must_use]
    pub const fn new(ttl: i32, priority: i32) -> Self {
        Self { ttl, priority }
    }
}

/// Packet policies for every built-in producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Conversation history, replaced every turn.
    pub conversation: PacketPolicy,
    /// Retrieved knowledge, relevant for the turn it was fetched in.
    pub retrieval: PacketPolicy,
    /// Reflection summaries, kept for a few turns.
    pub reflection: PacketPolicy,
    /// Audio controller snapshot, replaced every turn.
    pub audio: PacketPolicy,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            conversation: PacketPolicy::new(-1, 50),
            retrieval: PacketPolicy::new(1, 100),
            reflection: PacketPolicy::new(3, 0),
            audio: PacketPolicy::new(-1, 0),
        }
    }
}
