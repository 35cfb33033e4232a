//! Automated agent: answers through a language model

use std::fmt;
use std::sync::Arc;

use super::model::{CompletionRequest, FragmentHandler, LanguageModel};
use super::profile::AgentProfile;
use super::prompts::{self, PromptContext};
use super::{TurnContext, TurnOutcome};
use crate::chat::EventSink;
use crate::message::Message;
use crate::{Error, Result};

/// Agent whose turns are produced by a [`LanguageModel`]
#[derive(Clone)]
pub struct AutomatedAgent {
    profile: AgentProfile,
    model: Arc<dyn LanguageModel>,
}

impl fmt::Debug for AutomatedAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomatedAgent")
            .field("profile", &self.profile)
            .field("model", &self.model.name())
            .finish()
    }
}

/// Collects fragments into the final message and mirrors them to observers
struct Assembler<'a> {
    speaker: &'a str,
    events: &'a EventSink,
    buffer: String,
}

impl FragmentHandler for Assembler<'_> {
    fn on_fragment(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.events.fragment(self.speaker, text);
    }
}

impl AutomatedAgent {
    pub fn new(profile: AgentProfile, model: Arc<dyn LanguageModel>) -> Self {
        Self { profile, model }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    fn request(&self, ctx: &TurnContext<'_>) -> CompletionRequest {
        let context = PromptContext::new()
            .with_agent(&self.profile.name)
            .with_persona(&self.profile.system_prompt)
            .with_participants(ctx.participants)
            .with_stop_phrase(ctx.stop_phrase);

        CompletionRequest {
            agent: self.profile.name.clone(),
            system_prompt: prompts::persona_prompt(&context),
            messages: ctx.history.to_vec(),
            temperature: self.profile.temperature,
            plugins: self.profile.plugins.clone(),
        }
    }

    /// Run one turn
    ///
    /// Fragments reach observers as they arrive; only the assembled text is
    /// returned. If the token fires first the partial text is discarded.
    pub async fn take_turn(&self, ctx: &TurnContext<'_>) -> Result<TurnOutcome> {
        let request = self.request(ctx);
        let mut assembler = Assembler {
            speaker: &self.profile.name,
            events: ctx.events,
            buffer: String::new(),
        };

        tracing::debug!(agent = %self.profile.name, model = self.model.name(), "requesting completion");

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                tracing::debug!(agent = %self.profile.name, "turn cancelled mid-stream");
                return Ok(TurnOutcome::Cancelled);
            }
            result = self.model.stream(&request, &mut assembler) => result?,
        }

        let content = assembler.buffer.trim();
        if content.is_empty() {
            return Err(Error::Agent(format!(
                "{} returned an empty response",
                self.profile.name
            )));
        }

        Ok(TurnOutcome::Message(Message::assistant(
            self.profile.name.as_str(),
            content,
        )))
    }
}
