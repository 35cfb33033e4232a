//! Language-model abstraction used by automated agents

use async_trait::async_trait;
use std::sync::Arc;

use super::profile::AgentProfile;
use crate::message::Message;
use crate::Result;

/// Everything a model needs to produce one agent turn
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Name of the agent that is speaking
    pub agent: String,
    /// Rendered persona and chat instructions
    pub system_prompt: String,
    /// Full history in conversation order
    pub messages: Vec<Message>,
    /// Sampling temperature; backends without such a setting ignore it
    pub temperature: f32,
    /// Capability names the agent may invoke
    pub plugins: Vec<String>,
}

/// Receives response text as the model produces it
pub trait FragmentHandler: Send {
    fn on_fragment(&mut self, text: &str);
}

/// Opaque "respond given this history" capability
///
/// Implementations must be cancel-safe: dropping the `stream` future abandons
/// the request.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Produce a response, passing each text fragment to `handler`
    ///
    /// Returns once the response is complete.
    async fn stream(
        &self,
        request: &CompletionRequest,
        handler: &mut dyn FragmentHandler,
    ) -> Result<()>;
}

/// Supplies a model for each automated agent in a roster
pub trait ModelProvider {
    fn model_for(&self, profile: &AgentProfile) -> Arc<dyn LanguageModel>;
}

impl<F> ModelProvider for F
where
    F: Fn(&AgentProfile) -> Arc<dyn LanguageModel>,
{
    fn model_for(&self, profile: &AgentProfile) -> Arc<dyn LanguageModel> {
        self(profile)
    }
}
