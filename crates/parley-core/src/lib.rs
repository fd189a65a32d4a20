//! # parley-core
//!
//! Foundation types shared by every Parley crate:
//!
//! - **Messages**: [`Role`] and [`ChatMessage`], the role/content records
//!   exchanged with the language model
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod logging;
pub mod messages;

pub use messages::{ChatMessage, Role};
