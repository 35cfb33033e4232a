//! The group chat session and its run loop

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{ChatEvent, EventSink};
use super::graph::{Edge, Topology, TransitionGraph};
use super::state::{ChatState, Lifecycle};
use super::stop::StopCondition;
use crate::agent::{Agent, InputRequest, ModelProvider, Roster, TurnContext, TurnOutcome};
use crate::message::{format_transcript, History, Message};
use crate::{Error, Result};

/// Why a run ended in [`ChatState::Error`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnFailure {
    /// Agent whose turn failed, or the last speaker when no next speaker exists
    pub agent: String,
    pub cause: String,
}

/// What a call to `run` or `provide_input` left behind
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: ChatState,
    /// Messages committed by this run, starting with its seed
    pub transcript: Vec<Message>,
    /// Completed turns counted against the budget
    pub rounds: usize,
    pub failure: Option<TurnFailure>,
    /// Set while the run waits for human input
    pub pending_input: Option<InputRequest>,
}

impl RunOutcome {
    /// Messages added by agents, without the seed
    pub fn replies(&self) -> &[Message] {
        self.transcript.get(1..).unwrap_or_default()
    }

    /// Plain-text transcript, one `author: content` line per message
    pub fn summary(&self) -> String {
        format_transcript(&self.transcript)
    }
}

/// Bookkeeping for the current (or last) run
#[derive(Debug)]
struct RunProgress {
    /// History index of the seed message
    start: usize,
    round: usize,
    budget: usize,
    stop: StopCondition,
    previous: Option<String>,
    suspended: Option<InputRequest>,
    /// Speaker whose suspended turn is being re-entered
    resume: Option<String>,
    failure: Option<TurnFailure>,
}

/// Builder for [`GroupChat`]
#[derive(Debug, Default)]
pub struct GroupChatBuilder {
    agents: Vec<Agent>,
    admin: Option<String>,
    topology: Topology,
    edges: Option<Vec<Edge>>,
    start: Option<String>,
}

impl GroupChatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; roster order is insertion order
    pub fn agent(mut self, agent: impl Into<Agent>) -> Self {
        self.agents.push(agent.into());
        self
    }

    /// Name the admin (defaults to the first agent)
    pub fn admin(mut self, name: impl Into<String>) -> Self {
        self.admin = Some(name.into());
        self
    }

    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Use an explicit edge list instead of a built-in topology
    pub fn edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges = Some(edges);
        self
    }

    /// First speaker of a custom graph (defaults to the admin)
    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    pub fn build(self) -> Result<GroupChat> {
        if self.agents.is_empty() {
            return Err(Error::Config("Roster is empty".to_string()));
        }

        let names: Vec<String> = self.agents.iter().map(|a| a.name().to_string()).collect();
        let admin = self.admin.unwrap_or_else(|| names[0].clone());

        let admin_agent = self
            .agents
            .iter()
            .find(|a| a.name() == admin)
            .ok_or_else(|| Error::Config(format!("Admin '{}' is not in the roster", admin)))?;
        if admin_agent.is_human_proxy() {
            return Err(Error::Config(format!(
                "Admin '{}' cannot be a human proxy",
                admin
            )));
        }

        let graph = match self.edges {
            Some(edges) => {
                let start = self.start.as_deref().unwrap_or(&admin);
                TransitionGraph::custom(&names, edges, start)?
            }
            None => TransitionGraph::from_topology(self.topology, &names, &admin)?,
        };

        tracing::debug!(
            admin = %admin,
            agents = names.len(),
            edges = graph.edges().len(),
            "Group chat configured"
        );

        Ok(GroupChat {
            agents: self.agents,
            admin,
            graph,
            history: History::new(),
            lifecycle: Lifecycle::new(),
            events: EventSink::new(),
            run: None,
            rotation: HashMap::new(),
        })
    }
}

/// A turn-based conversation between several agents
#[derive(Debug)]
pub struct GroupChat {
    agents: Vec<Agent>,
    admin: String,
    graph: TransitionGraph,
    history: History,
    lifecycle: Lifecycle,
    events: EventSink,
    run: Option<RunProgress>,
    /// Per previous speaker, index of the next candidate to rotate to
    rotation: HashMap<String, usize>,
}

impl GroupChat {
    pub fn builder() -> GroupChatBuilder {
        GroupChatBuilder::new()
    }

    /// Build a chat from a validated roster, admin first
    pub fn from_roster(roster: &Roster, topology: Topology, models: &dyn ModelProvider) -> Result<Self> {
        let mut builder = GroupChatBuilder::new()
            .admin(roster.admin().name.as_str())
            .topology(topology);
        for profile in roster.chat_order() {
            builder = builder.agent(Agent::from_profile(profile.clone(), models));
        }
        builder.build()
    }

    pub fn state(&self) -> ChatState {
        self.lifecycle.current()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    pub fn admin(&self) -> &str {
        &self.admin
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Rounds completed by the current or last run
    pub fn round(&self) -> usize {
        self.run.as_ref().map_or(0, |r| r.round)
    }

    /// The open human-input request, if the run is suspended
    pub fn pending_input(&self) -> Option<&InputRequest> {
        self.run.as_ref().and_then(|r| r.suspended.as_ref())
    }

    /// Receive turn events from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Start a run with `seed` as the user's message
    ///
    /// If the chat is waiting for human input, `seed` is delivered as that
    /// input instead and the suspended run continues with its original budget
    /// and stop condition.
    pub async fn run(
        &mut self,
        seed: impl Into<String>,
        round_budget: usize,
        stop: StopCondition,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let seed = seed.into();

        if self.state() == ChatState::AwaitingHumanInput {
            tracing::debug!("Run requested while awaiting input, delivering seed as input");
            return self.provide_input(seed, cancel).await;
        }

        self.lifecycle.transition_to(ChatState::Running)?;

        let start = self.history.len();
        self.history.push(Message::user(seed));
        self.run = Some(RunProgress {
            start,
            round: 0,
            budget: round_budget,
            stop,
            previous: None,
            suspended: None,
            resume: None,
            failure: None,
        });

        tracing::info!(round_budget, agents = self.agents.len(), "Group chat run started");
        self.drive(&cancel).await
    }

    /// Deliver text for the pending human-proxy turn and continue the run
    ///
    /// Returns [`Error::NoPendingInput`] and changes nothing when the chat is
    /// not waiting for input.
    pub async fn provide_input(
        &mut self,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        if self.state() != ChatState::AwaitingHumanInput {
            return Err(Error::NoPendingInput);
        }
        let request = self.pending_input().cloned().ok_or(Error::NoPendingInput)?;

        if cancel.is_cancelled() {
            return self.finish(ChatState::Cancelled);
        }

        match self.agents.iter_mut().find(|a| a.name() == request.agent) {
            Some(Agent::HumanProxy(human)) => human.supply(request.id, text)?,
            _ => {
                return Err(Error::Other(format!(
                    "'{}' is not a human proxy in this chat",
                    request.agent
                )))
            }
        }

        let progress = self.progress_mut()?;
        progress.suspended = None;
        progress.resume = Some(request.agent.clone());
        self.lifecycle.transition_to(ChatState::Running)?;

        tracing::info!(agent = %request.agent, request_id = request.id, "Human input received, resuming");
        self.drive(&cancel).await
    }

    /// Abandon a pending human-input wait, ending the run as cancelled
    pub fn cancel_pending(&mut self) -> Result<RunOutcome> {
        if self.state() != ChatState::AwaitingHumanInput {
            return Err(Error::NoPendingInput);
        }
        self.finish(ChatState::Cancelled)
    }

    /// Clear history and return to `Idle`
    pub fn reset(&mut self) {
        for agent in &mut self.agents {
            if let Agent::HumanProxy(human) = agent {
                human.abandon();
            }
        }
        self.history.clear();
        self.run = None;
        self.rotation.clear();
        self.events.prune();
        // every state may move to Idle
        let _ = self.lifecycle.transition_to(ChatState::Idle);
        tracing::info!("Group chat reset");
    }

    /// Take turns until the run stops or suspends
    async fn drive(&mut self, cancel: &CancellationToken) -> Result<RunOutcome> {
        loop {
            let (round, budget, previous, resumed) = {
                let progress = self.progress_mut()?;
                (
                    progress.round,
                    progress.budget,
                    progress.previous.clone(),
                    progress.resume.take(),
                )
            };

            if cancel.is_cancelled() {
                return self.finish(ChatState::Cancelled);
            }

            if round >= budget {
                tracing::debug!(rounds = round, "Round budget exhausted");
                return self.finish(ChatState::Completed);
            }

            let round = round + 1;
            let speaker = match resumed {
                Some(speaker) => speaker,
                None => match self.select_speaker(previous.as_deref()) {
                    Ok(speaker) => {
                        tracing::info!(round, speaker = %speaker, "Turn started");
                        self.events.emit(ChatEvent::TurnStarted {
                            round,
                            speaker: speaker.clone(),
                        });
                        speaker
                    }
                    Err(e) => {
                        let agent = previous.unwrap_or_else(|| self.graph.start().to_string());
                        return self.fail(agent, e);
                    }
                },
            };

            let Some(index) = self.agents.iter().position(|a| a.name() == speaker) else {
                return self.fail(
                    speaker.clone(),
                    Error::Graph(format!("'{}' is not in the roster", speaker)),
                );
            };

            let outcome = {
                let ctx = TurnContext {
                    history: self.history.messages(),
                    participants: self.graph.agents(),
                    stop_phrase: self.run.as_ref().and_then(|r| r.stop.as_phrase()),
                    events: &self.events,
                    cancel,
                };
                self.agents[index].take_turn(ctx).await
            };

            match outcome {
                Ok(TurnOutcome::Message(message)) => {
                    let committed = self.history.push(message).clone();
                    let progress = self.progress_mut()?;
                    progress.round = round;
                    progress.previous = Some(speaker.clone());
                    let stop = progress.stop.is_met(&committed);

                    tracing::info!(round, speaker = %speaker, chars = committed.content.len(), "Turn completed");
                    self.events.emit(ChatEvent::TurnCompleted {
                        round,
                        message: committed,
                    });

                    if stop {
                        tracing::info!(round, speaker = %speaker, "Stop condition met");
                        return self.finish(ChatState::Completed);
                    }
                }
                Ok(TurnOutcome::NeedsInput(request)) => {
                    self.progress_mut()?.suspended = Some(request.clone());
                    self.lifecycle.transition_to(ChatState::AwaitingHumanInput)?;
                    self.events.emit(ChatEvent::InputRequested(request));
                    return Ok(self.outcome());
                }
                Ok(TurnOutcome::Cancelled) => {
                    return self.finish(ChatState::Cancelled);
                }
                Err(e) => {
                    return self.fail(speaker, e);
                }
            }
        }
    }

    /// Pick who speaks after `previous`
    fn select_speaker(&mut self, previous: Option<&str>) -> Result<String> {
        let candidates = self.graph.next_candidates(previous);

        match candidates.as_slice() {
            [] => Err(Error::Graph(format!(
                "No agent may speak after '{}'",
                previous.unwrap_or(self.graph.start())
            ))),
            [only] => Ok(only.to_string()),
            _ => {
                let mentioned = self
                    .history
                    .last()
                    .and_then(|m| first_mention(&m.content, &candidates));
                if let Some(name) = mentioned {
                    return Ok(name.to_string());
                }

                // the entry turn rotates as if the graph's start agent just spoke
                let key = previous.unwrap_or(self.graph.start());
                let cursor = self.rotation.entry(key.to_string()).or_insert(0);
                let pick = candidates[*cursor % candidates.len()];
                *cursor = (*cursor + 1) % candidates.len();
                Ok(pick.to_string())
            }
        }
    }

    fn fail(&mut self, agent: String, error: Error) -> Result<RunOutcome> {
        tracing::warn!(agent = %agent, error = %error, "Turn failed");
        self.progress_mut()?.failure = Some(TurnFailure {
            agent,
            cause: error.to_string(),
        });
        self.finish(ChatState::Error)
    }

    /// Move to a final state and report
    fn finish(&mut self, state: ChatState) -> Result<RunOutcome> {
        self.lifecycle.transition_to(state)?;

        if let Some(progress) = self.run.as_mut() {
            progress.suspended = None;
            progress.resume = None;
        }
        for agent in &mut self.agents {
            if let Agent::HumanProxy(human) = agent {
                human.abandon();
            }
        }

        tracing::info!(state = ?state, rounds = self.round(), "Group chat run finished");
        self.events.emit(ChatEvent::RunFinished { state });
        Ok(self.outcome())
    }

    fn outcome(&self) -> RunOutcome {
        match &self.run {
            Some(progress) => RunOutcome {
                state: self.state(),
                transcript: self.history.since(progress.start).to_vec(),
                rounds: progress.round,
                failure: progress.failure.clone(),
                pending_input: progress.suspended.clone(),
            },
            None => RunOutcome {
                state: self.state(),
                transcript: Vec::new(),
                rounds: 0,
                failure: None,
                pending_input: None,
            },
        }
    }

    fn progress_mut(&mut self) -> Result<&mut RunProgress> {
        self.run
            .as_mut()
            .ok_or_else(|| Error::Other("No run in progress".to_string()))
    }
}

/// Candidate whose name appears first in `content`, as a whole word
fn first_mention<'a>(content: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let haystack = content.to_lowercase();
    candidates
        .iter()
        .filter_map(|name| find_word(&haystack, &name.to_lowercase()).map(|pos| (pos, *name)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, name)| name)
}

fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentProfile, AutomatedAgent, HumanProxyAgent, LanguageModel};
    use crate::message::Author;
    use crate::test_support::{Script, ScriptedModel};
    use std::sync::Arc;

    fn bot(name: &str, replies: &[&str]) -> AutomatedAgent {
        AutomatedAgent::new(
            AgentProfile::new(name),
            Arc::new(ScriptedModel::replies(replies)),
        )
    }

    fn scripted_bot(name: &str, scripts: Vec<Script>) -> AutomatedAgent {
        AutomatedAgent::new(AgentProfile::new(name), Arc::new(ScriptedModel::new(scripts)))
    }

    fn human(name: &str) -> HumanProxyAgent {
        HumanProxyAgent::new(AgentProfile::new(name).user_proxy())
    }

    fn authors(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.author.name()).collect()
    }

    #[tokio::test]
    async fn test_stop_phrase_ends_run_early() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["Make it shorter."]))
            .agent(bot("Writer", &["Draft one.", "Final draft. [STOP]"]))
            .topology(Topology::HubAndSpoke)
            .build()
            .unwrap();

        let outcome = chat
            .run(
                "Write a haiku",
                10,
                StopCondition::phrase("[STOP]"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::Completed);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.replies().len(), 3);
        assert_eq!(authors(outcome.replies()), vec!["Writer", "Admin", "Writer"]);
        assert!(outcome.transcript.last().unwrap().content.contains("[STOP]"));
        assert_eq!(
            outcome.summary(),
            "user: Write a haiku\nWriter: Draft one.\nAdmin: Make it shorter.\nWriter: Final draft. [STOP]"
        );
    }

    #[tokio::test]
    async fn test_budget_exhaustion_completes() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["a1", "a2"]))
            .agent(bot("B", &["b1"]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        let outcome = chat
            .run("go", 3, StopCondition::phrase("[STOP]"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::Completed);
        assert_eq!(outcome.transcript.len() - 1, outcome.rounds);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(authors(&outcome.transcript), vec!["user", "A", "B", "A"]);
        assert_eq!(chat.history().len(), 4);
    }

    #[tokio::test]
    async fn test_zero_budget() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &[]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        let outcome = chat
            .run("go", 0, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, ChatState::Completed);
        assert_eq!(outcome.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_human_proxy_suspends_and_resumes() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["Thanks, anything else?"]))
            .agent(human("HumanProxy"))
            .build()
            .unwrap();

        let outcome = chat
            .run("Plan a trip", 5, StopCondition::phrase("[STOP]"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::AwaitingHumanInput);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.transcript.len(), 1);
        let request = outcome.pending_input.unwrap();
        assert_eq!(request.agent, "HumanProxy");
        assert_eq!(chat.pending_input(), Some(&request));

        let outcome = chat
            .provide_input("hello", CancellationToken::new())
            .await
            .unwrap();

        let from_human: Vec<&Message> = outcome
            .transcript
            .iter()
            .filter(|m| m.author.is_agent("HumanProxy"))
            .collect();
        assert_eq!(from_human.len(), 1);
        assert_eq!(from_human[0].content, "hello");
        assert_eq!(outcome.transcript[1].content, "hello");

        // Admin answered, then the proxy is asked again
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.state, ChatState::AwaitingHumanInput);
        assert_eq!(authors(&outcome.transcript), vec!["user", "HumanProxy", "Admin"]);
    }

    #[tokio::test]
    async fn test_run_while_awaiting_delivers_input() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["ok [STOP]"]))
            .agent(human("Human"))
            .build()
            .unwrap();

        chat.run("start", 5, StopCondition::phrase("[STOP]"), CancellationToken::new())
            .await
            .unwrap();
        let outcome = chat
            // budget and stop given here are ignored; the suspended run continues
            .run("my answer", 1, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::Completed);
        assert_eq!(authors(&outcome.transcript), vec!["user", "Human", "Admin"]);
        assert_eq!(outcome.transcript[0].content, "start");
        assert_eq!(chat.history().len(), 3);
    }

    #[tokio::test]
    async fn test_provide_input_without_pending() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["x"]))
            .agent(bot("B", &["y"]))
            .build()
            .unwrap();

        let err = chat
            .provide_input("hello", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingInput));
        assert_eq!(chat.state(), ChatState::Idle);
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_pending_input() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["reply"]))
            .agent(human("Human"))
            .build()
            .unwrap();

        chat.run("start", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();
        let outcome = chat.cancel_pending().unwrap();

        assert_eq!(outcome.state, ChatState::Cancelled);
        assert!(outcome.pending_input.is_none());
        assert!(chat.pending_input().is_none());
        assert!(matches!(chat.cancel_pending(), Err(Error::NoPendingInput)));
    }

    #[tokio::test]
    async fn test_provide_input_with_cancelled_token() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["reply"]))
            .agent(human("Human"))
            .build()
            .unwrap();

        chat.run("start", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = chat.provide_input("late", cancel).await.unwrap();

        assert_eq!(outcome.state, ChatState::Cancelled);
        assert_eq!(outcome.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_agent_error_stops_run() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["first"]))
            .agent(scripted_bot("B", vec![Script::fail("upstream 500")]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        let outcome = chat
            .run("go", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::Error);
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.rounds, 1);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.agent, "B");
        assert!(failure.cause.contains("upstream 500"));
    }

    #[tokio::test]
    async fn test_cancel_mid_turn_keeps_committed_history() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["complete answer"]))
            .agent(scripted_bot("B", vec![Script::stall_after(&["half an ans"])]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let mut rx = chat.subscribe();
        let watcher = async move {
            while let Some(event) = rx.recv().await {
                if let ChatEvent::Fragment { speaker, .. } = &event {
                    if speaker == "B" {
                        canceller.cancel();
                        break;
                    }
                }
            }
        };

        let (outcome, _) = tokio::join!(chat.run("go", 5, StopCondition::Never, cancel), watcher);
        let outcome = outcome.unwrap();

        assert_eq!(outcome.state, ChatState::Cancelled);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(authors(&outcome.transcript), vec!["user", "A"]);
        assert_eq!(outcome.transcript.last().unwrap().content, "complete answer");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["never"]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = chat.run("go", 3, StopCondition::Never, cancel).await.unwrap();

        assert_eq!(outcome.state, ChatState::Cancelled);
        assert_eq!(outcome.transcript.len(), 1);
        assert_eq!(outcome.rounds, 0);
    }

    #[tokio::test]
    async fn test_custom_graph_dead_end_is_error() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["one"]))
            .agent(bot("B", &["two"]))
            .edges(vec![Edge::new("A", "B")])
            .build()
            .unwrap();

        let outcome = chat
            .run("go", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, ChatState::Error);
        assert_eq!(authors(&outcome.transcript), vec!["user", "A", "B"]);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.agent, "B");
        assert!(failure.cause.contains("No agent may speak after 'B'"));
    }

    #[tokio::test]
    async fn test_hub_selects_mentioned_spoke_then_rotates() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["Critic, what do you think?", "Thanks both."]))
            .agent(bot("Writer", &["Here is a draft."]))
            .agent(bot("Critic", &["Too long."]))
            .build()
            .unwrap();

        let outcome = chat
            .run("Start", 4, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        // no mention in the seed, so rotation picks the first spoke
        assert_eq!(
            authors(outcome.replies()),
            vec!["Writer", "Admin", "Critic", "Admin"]
        );
    }

    #[tokio::test]
    async fn test_hub_rotates_through_every_spoke() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["Noted.", "Go on."]))
            .agent(bot("Writer", &["A draft.", "Another draft."]))
            .agent(bot("Critic", &["Too long."]))
            .build()
            .unwrap();

        let outcome = chat
            .run("Start", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            authors(outcome.replies()),
            vec!["Writer", "Admin", "Critic", "Admin", "Writer"]
        );
    }

    #[test]
    fn test_first_mention_prefers_earliest_whole_word() {
        let candidates = ["Writer", "Critic", "Ed"];
        assert_eq!(
            first_mention("critic first, then writer", &candidates),
            Some("Critic")
        );
        assert_eq!(first_mention("Edited by nobody", &candidates), None);
        assert_eq!(first_mention("nobody here", &candidates), None);
    }

    #[tokio::test]
    async fn test_events_follow_turn_lifecycle() {
        let mut chat = GroupChat::builder()
            .agent(scripted_bot("A", vec![Script::reply(&["Hel", "lo"])]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();
        let mut rx = chat.subscribe();

        chat.run("go", 1, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            ChatEvent::TurnStarted {
                round: 1,
                speaker: "A".to_string()
            }
        );
        assert!(matches!(&events[1], ChatEvent::Fragment { text, .. } if text == "Hel"));
        assert!(matches!(&events[2], ChatEvent::Fragment { text, .. } if text == "lo"));
        assert!(
            matches!(&events[3], ChatEvent::TurnCompleted { round: 1, message } if message.content == "Hello")
        );
        assert_eq!(
            events[4],
            ChatEvent::RunFinished {
                state: ChatState::Completed
            }
        );
    }

    #[tokio::test]
    async fn test_second_run_continues_history() {
        let mut chat = GroupChat::builder()
            .agent(bot("A", &["first", "second"]))
            .topology(Topology::RoundRobin)
            .build()
            .unwrap();

        chat.run("one", 1, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();
        let outcome = chat
            .run("two", 1, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.transcript[0].content, "two");
        assert_eq!(chat.history().len(), 4);
        assert_eq!(chat.history().messages()[3].sequence, 3);
    }

    #[tokio::test]
    async fn test_reset_clears_session() {
        let mut chat = GroupChat::builder()
            .agent(bot("Admin", &["reply"]))
            .agent(human("Human"))
            .build()
            .unwrap();

        chat.run("start", 5, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();
        chat.reset();

        assert_eq!(chat.state(), ChatState::Idle);
        assert!(chat.history().is_empty());
        assert_eq!(chat.round(), 0);
        assert!(chat.pending_input().is_none());
    }

    #[tokio::test]
    async fn test_turns_see_prior_history() {
        let writer_model = Arc::new(ScriptedModel::replies(&["draft"]));
        let admin_model = Arc::new(ScriptedModel::replies(&["noted"]));
        let mut chat = GroupChat::builder()
            .agent(AutomatedAgent::new(AgentProfile::new("Admin"), admin_model.clone()))
            .agent(AutomatedAgent::new(AgentProfile::new("Writer"), writer_model.clone()))
            .build()
            .unwrap();

        chat.run("topic", 2, StopCondition::Never, CancellationToken::new())
            .await
            .unwrap();

        let admin_requests = admin_model.requests();
        assert_eq!(admin_requests.len(), 1);
        let seen: Vec<&Author> = admin_requests[0].messages.iter().map(|m| &m.author).collect();
        assert_eq!(seen, vec![&Author::User, &Author::agent("Writer")]);
        assert_eq!(writer_model.requests()[0].messages.len(), 1);
    }

    #[test]
    fn test_builder_rejects_bad_rosters() {
        assert!(GroupChat::builder().build().is_err());

        let unknown_admin = GroupChat::builder()
            .agent(bot("A", &[]))
            .agent(bot("B", &[]))
            .admin("Z")
            .build();
        assert!(matches!(unknown_admin, Err(Error::Config(_))));

        let human_admin = GroupChat::builder()
            .agent(human("H"))
            .agent(bot("B", &[]))
            .build();
        assert!(human_admin.is_err());

        let duplicate = GroupChat::builder()
            .agent(bot("A", &[]))
            .agent(bot("A", &[]))
            .build();
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_from_roster_puts_admin_first() {
        let roster = Roster::new(vec![
            AgentProfile::new("Writer"),
            AgentProfile::new("Editor").primary(),
            AgentProfile::new("Human").user_proxy(),
        ])
        .unwrap();
        let models = |_: &AgentProfile| -> Arc<dyn LanguageModel> {
            Arc::new(ScriptedModel::replies(&[]))
        };

        let chat = GroupChat::from_roster(&roster, Topology::RoundRobin, &models).unwrap();

        assert_eq!(chat.admin(), "Editor");
        assert_eq!(chat.graph().agents(), &["Editor", "Writer", "Human"]);
        assert_eq!(chat.graph().next_candidates(None), vec!["Editor"]);
        assert!(chat.agents()[2].is_human_proxy());
    }
}
