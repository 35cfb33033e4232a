//! Agents taking part in a group chat
//!
//! The variants form a closed set dispatched through [`Agent::take_turn`]:
//! automated agents answer through a [`LanguageModel`], human proxies wait for
//! text supplied from outside the session.

mod automated;
mod claude;
mod human;
mod model;
mod output;
mod profile;
mod prompts;

use tokio_util::sync::CancellationToken;

pub use automated::AutomatedAgent;
pub use claude::{ClaudeModel, ClaudeProvider};
pub use human::{HumanProxyAgent, InputRequest};
pub use model::{CompletionRequest, FragmentHandler, LanguageModel, ModelProvider};
pub use output::{OutputStreamer, StreamHandler, StreamMessage};
pub use profile::{AgentProfile, ModelTier, Roster};
pub use prompts::{persona_prompt, turn_prompt, PromptContext};

use crate::chat::EventSink;
use crate::message::Message;
use crate::Result;

/// What a speaker sees when it takes a turn
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// Committed history, oldest first
    pub history: &'a [Message],
    /// Every agent in the chat, in roster order
    pub participants: &'a [String],
    /// Phrase that ends the run, if the stop condition has one
    pub stop_phrase: Option<&'a str>,
    pub events: &'a EventSink,
    pub cancel: &'a CancellationToken,
}

/// Result of one attempted turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The completed message, ready to be committed
    Message(Message),
    /// The speaker is a human proxy with no input yet
    NeedsInput(InputRequest),
    /// The run was cancelled before the turn finished
    Cancelled,
}

/// A chat participant
#[derive(Debug, Clone)]
pub enum Agent {
    Automated(AutomatedAgent),
    HumanProxy(HumanProxyAgent),
}

impl Agent {
    /// Build the variant a profile asks for
    pub fn from_profile(profile: AgentProfile, models: &dyn ModelProvider) -> Self {
        if profile.is_user_proxy {
            Agent::HumanProxy(HumanProxyAgent::new(profile))
        } else {
            let model = models.model_for(&profile);
            Agent::Automated(AutomatedAgent::new(profile, model))
        }
    }

    pub fn name(&self) -> &str {
        self.profile().name.as_str()
    }

    pub fn profile(&self) -> &AgentProfile {
        match self {
            Agent::Automated(agent) => agent.profile(),
            Agent::HumanProxy(agent) => agent.profile(),
        }
    }

    pub fn is_human_proxy(&self) -> bool {
        matches!(self, Agent::HumanProxy(_))
    }

    /// Take one turn given the committed history
    pub async fn take_turn(&mut self, ctx: TurnContext<'_>) -> Result<TurnOutcome> {
        match self {
            Agent::Automated(agent) => agent.take_turn(&ctx).await,
            Agent::HumanProxy(agent) => Ok(agent.take_turn()),
        }
    }
}

impl From<AutomatedAgent> for Agent {
    fn from(agent: AutomatedAgent) -> Self {
        Agent::Automated(agent)
    }
}

impl From<HumanProxyAgent> for Agent {
    fn from(agent: HumanProxyAgent) -> Self {
        Agent::HumanProxy(agent)
    }
}
