//! Human-proxy agent: turns are filled by externally supplied text

use serde::{Deserialize, Serialize};

use super::profile::AgentProfile;
use super::TurnOutcome;
use crate::message::{Author, Message, Role};
use crate::{Error, Result};

/// A pending request for human input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    /// Distinguishes successive requests from the same agent
    pub id: u64,
    /// Agent waiting for input
    pub agent: String,
}

/// Agent that waits for a person to type its message
#[derive(Debug, Clone)]
pub struct HumanProxyAgent {
    profile: AgentProfile,
    pending: Option<InputRequest>,
    inbox: Option<String>,
    next_id: u64,
}

impl HumanProxyAgent {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            pending: None,
            inbox: None,
            next_id: 1,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// The request currently waiting for input, if any
    pub fn pending(&self) -> Option<&InputRequest> {
        self.pending.as_ref()
    }

    /// Take a turn
    ///
    /// Without supplied input this opens (or repeats) an input request and
    /// produces no message. There is no timeout.
    pub fn take_turn(&mut self) -> TurnOutcome {
        if let Some(text) = self.inbox.take() {
            return TurnOutcome::Message(Message::new(
                Author::agent(self.profile.name.as_str()),
                Role::User,
                text,
            ));
        }

        let request = self.pending.get_or_insert_with(|| {
            let request = InputRequest {
                id: self.next_id,
                agent: self.profile.name.clone(),
            };
            self.next_id += 1;
            request
        });

        tracing::info!(agent = %request.agent, request_id = request.id, "waiting for human input");
        TurnOutcome::NeedsInput(request.clone())
    }

    /// Supply text for a pending request
    ///
    /// Fails without changing anything if `request_id` is not the open request.
    pub fn supply(&mut self, request_id: u64, text: impl Into<String>) -> Result<()> {
        match &self.pending {
            Some(request) if request.id == request_id => {
                self.pending = None;
                self.inbox = Some(text.into());
                Ok(())
            }
            _ => Err(Error::NoPendingInput),
        }
    }

    /// Drop any open request and unread input
    pub fn abandon(&mut self) {
        self.pending = None;
        self.inbox = None;
    }
}
