//! # parley-context
//!
//! Context packet lifecycle for the Parley agent.
//!
//! - **Packets**: [`ContextPacket`] units with a [`PacketKind`], a payload, a
//!   provenance tag, a turn countdown ([`Ttl`]) and a render priority
//! - **Controller**: [`ContextController`] ages packets once per turn, purges
//!   expired ones, and flattens the rest into model-ready messages
//! - **Rendering**: [`render_packet`] maps a packet to zero or more messages
//!
//! The controller is single-owner and synchronous: mutation takes `&mut self`,
//! assembly takes `&self`.

#![deny(unsafe_code)]

pub mod constants;
pub mod controller;
pub mod packet;
pub mod render;

pub use controller::{ContextController, PacketSummary};
pub use packet::{ContextPacket, PacketContent, PacketKind, Ttl};
pub use render::render_packet;
