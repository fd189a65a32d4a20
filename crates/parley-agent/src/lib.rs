//! # parley-agent
//!
//! Everything that feeds the context controller, plus the driver that runs
//! one conversational turn.
//!
//! - [`memory`]: dialogue history, snapshotted as a Conversation packet
//! - [`retrieval`]: embedding search, emitted as a RetrievedKnowledge packet
//! - [`reflection`]: periodic summaries, emitted as Reflection packets
//! - [`audio`]: microphone/speaker exclusion, carried as packet metadata
//! - [`planner`] and [`tools`]: optional tool use before answering, with
//!   [`calculator`] as the built-in tool
//! - [`llm`]: the [`ChatModel`] seam
//! - [`turn`]: [`TurnDriver`], which applies the per-turn protocol

#![deny(unsafe_code)]

pub mod audio;
pub mod calculator;
pub mod errors;
pub mod llm;
pub mod memory;
pub mod planner;
pub mod reflection;
pub mod retrieval;
pub mod tools;
pub mod turn;

pub use audio::{AudioController, AudioError, AudioState};
pub use calculator::CalculatorTool;
pub use errors::{AgentError, ProviderError, Result};
pub use llm::ChatModel;
pub use memory::ConversationMemory;
pub use planner::{Plan, Planner};
pub use reflection::Reflector;
pub use retrieval::{Document, Embedder};
pub use tools::{Tool, ToolRegistry};
pub use turn::{TurnDriver, TurnOutcome};
