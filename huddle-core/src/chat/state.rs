//! Session lifecycle state machine
//!
//! Tracks where a group chat is in its run and rejects transitions the
//! orchestrator must never make.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle state of a group chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    /// No run has started since creation or reset
    #[default]
    Idle,
    /// Turns are being taken
    Running,
    /// A human-proxy agent is waiting for typed input
    AwaitingHumanInput,
    /// Stop phrase matched or round budget used up
    Completed,
    /// The run's cancellation token fired
    Cancelled,
    /// A turn failed or the graph produced no speaker
    Error,
}

impl ChatState {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            ChatState::Idle => "Idle",
            ChatState::Running => "Running",
            ChatState::AwaitingHumanInput => "Awaiting human input",
            ChatState::Completed => "Completed",
            ChatState::Cancelled => "Cancelled",
            ChatState::Error => "Error",
        }
    }

    /// Whether the last run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatState::Completed | ChatState::Cancelled | ChatState::Error
        )
    }

    /// Check if moving to `next` is allowed
    pub fn can_transition_to(&self, next: ChatState) -> bool {
        use ChatState::*;
        match (self, next) {
            (Idle, Running) => true,
            (Running, AwaitingHumanInput | Completed | Cancelled | Error) => true,
            (AwaitingHumanInput, Running | Cancelled) => true,
            // a finished run may be followed by a new one
            (from, Running) if from.is_terminal() => true,
            // reset
            (_, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Current state plus the guard that enforces the transition table
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    current: ChatState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ChatState {
        self.current
    }

    /// Attempt to move to a new state
    ///
    /// Returns an error and leaves the state unchanged if the move is not valid.
    pub fn transition_to(&mut self, next: ChatState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }

        tracing::info!(from = ?self.current, to = ?next, "Chat state transition");

        self.current = next;
        Ok(())
    }
}
