//! Context controller.
//!
//! [`ContextController`] owns every live [`ContextPacket`]. It has three jobs:
//!
//! - **Insertion**: [`add`](ContextController::add) appends,
//!   [`replace_by_source`](ContextController::replace_by_source) swaps out a
//!   producer's previous packet.
//! - **Aging**: [`step`](ContextController::step) counts every packet down one
//!   turn and purges the expired ones. Call it exactly once per turn.
//! - **Assembly**: [`build_messages`](ContextController::build_messages)
//!   flattens the current set into the message list for a model call. It is
//!   read-only; calling it twice without an intervening mutation returns the
//!   same list.
//!
//! Packets are stored in insertion order. Rendering order is priority
//! descending, with insertion order breaking ties.

use std::cmp::Reverse;

use parley_core::messages::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::packet::{ContextPacket, PacketKind};
use crate::render::render_into;

// =============================================================================
// PacketSummary
// =============================================================================

/// Diagnostic view of a stored packet. Carries no content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSummary {
    /// Packet kind.
    pub kind: PacketKind,
    /// Provenance tag.
    pub source: String,
    /// Raw ttl (`-1` for persistent).
    pub ttl: i32,
    /// Render priority.
    pub priority: i32,
}

impl From<&ContextPacket> for PacketSummary {
    fn from(packet: &ContextPacket) -> Self {
        Self {
            kind: packet.kind().clone(),
            source: packet.source().to_owned(),
            ttl: packet.ttl().as_raw(),
            priority: packet.priority(),
        }
    }
}

// =============================================================================
// ContextController
// =============================================================================

/// Owner of the live packet set.
#[derive(Clone, Debug, Default)]
pub struct ContextController {
    packets: Vec<ContextPacket>,
}

impl ContextController {
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Insertion ───────────────────────────────────────────────────────

    /// Insert a packet. No validation, no capacity limit.
    ///
    /// Persistent packets added here stay until replaced; producers that
    /// emit one packet per turn should use
    /// [`replace_by_source`](Self::replace_by_source) instead.
    pub fn add(&mut self, packet: ContextPacket) {
        debug!(
            kind = %packet.kind(),
            source = packet.source(),
            ttl = packet.ttl().as_raw(),
            priority = packet.priority(),
            "context packet added"
        );
        self.packets.push(packet);
    }

    /// Remove every packet from the same source, then insert `packet`.
    ///
    /// The new packet takes the newest insertion position. Returns how many
    /// packets were removed.
    pub fn replace_by_source(&mut self, packet: ContextPacket) -> usize {
        let before = self.packets.len();
        self.packets.retain(|p| p.source() != packet.source());
        let replaced = before - self.packets.len();
        if replaced > 0 {
            debug!(source = packet.source(), replaced, "replacing context packets");
        }
        self.add(packet);
        replaced
    }

    // ── Aging ───────────────────────────────────────────────────────────

    /// Advance every packet one turn and purge the expired ones.
    ///
    /// Returns the number of packets purged.
    pub fn step(&mut self) -> usize {
        for packet in &mut self.packets {
            packet.step();
        }

        let before = self.packets.len();
        self.packets.retain(|p| !p.is_expired());
        let purged = before - self.packets.len();

        debug!(purged, remaining = self.packets.len(), "context advanced one turn");
        purged
    }

    // ── Assembly ────────────────────────────────────────────────────────

    /// Flatten the current packets into model-ready messages.
    ///
    /// Packets are visited by priority descending; `sort_by_key` is stable, so
    /// equal priorities keep insertion order.
    #[must_use]
    pub fn build_messages(&self) -> Vec<ChatMessage> {
        let mut ordered: Vec<&ContextPacket> = self.packets.iter().collect();
        ordered.sort_by_key(|p| Reverse(p.priority()));

        let mut messages = Vec::new();
        for packet in ordered {
            render_into(packet, &mut messages);
        }
        messages
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Kind, source, ttl and priority of every stored packet, in insertion
    /// order. Debug and test use only; the shape is not stable.
    #[must_use]
    pub fn dump(&self) -> Vec<PacketSummary> {
        self.packets.iter().map(PacketSummary::from).collect()
    }

    /// Stored packets in insertion order.
    pub fn packets(&self) -> impl Iterator<Item = &ContextPacket> {
        self.packets.iter()
    }

    #[must_use]
    /// Number of stored packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
