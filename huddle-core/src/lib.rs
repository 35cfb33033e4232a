//! Huddle Core - multi-agent group chat orchestration
//!
//! This crate runs turn-based conversations between several agents, some
//! backed by a language model and some standing in for a human. A transition
//! graph decides who may speak next; runs end on a stop phrase, a round
//! budget, cancellation or a failed turn.

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod message;

#[cfg(test)]
mod test_support;

pub use agent::{Agent, AgentProfile, ClaudeModel, ClaudeProvider, LanguageModel, Roster};
pub use chat::{ChatEvent, ChatState, GroupChat, RunOutcome, StopCondition, Topology};
pub use config::Config;
pub use error::{Error, Result};
pub use message::{Author, History, Message, Role};
