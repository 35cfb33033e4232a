//! Scripted language models for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::agent::{CompletionRequest, FragmentHandler, LanguageModel};
use crate::{Error, Result};

/// One canned model response
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then finish
    Reply(Vec<String>),
    /// Stream these fragments, then never finish
    Stall(Vec<String>),
    /// Fail with this message
    Fail(String),
}

impl Script {
    pub fn reply(fragments: &[&str]) -> Self {
        Script::Reply(fragments.iter().map(|s| s.to_string()).collect())
    }

    pub fn stall_after(fragments: &[&str]) -> Self {
        Script::Stall(fragments.iter().map(|s| s.to_string()).collect())
    }

    pub fn fail(message: &str) -> Self {
        Script::Fail(message.to_string())
    }
}

/// Model that plays back scripts in order and records every request
#[derive(Debug, Default)]
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Single-fragment replies
    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Script::reply(&[*r])).collect())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        handler: &mut dyn FragmentHandler,
    ) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Agent(format!("no script left for {}", request.agent)))?;

        match script {
            Script::Reply(fragments) => {
                for fragment in fragments {
                    handler.on_fragment(&fragment);
                    tokio::task::yield_now().await;
                }
                Ok(())
            }
            Script::Stall(fragments) => {
                for fragment in fragments {
                    handler.on_fragment(&fragment);
                }
                std::future::pending::<()>().await;
                Ok(())
            }
            Script::Fail(message) => Err(Error::Agent(message)),
        }
    }
}
