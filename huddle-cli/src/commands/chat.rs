//! Chat command - run a group chat from a roster file

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use huddle_core::{
    ChatEvent, ChatState, ClaudeProvider, Config, GroupChat, Role, Roster, RunOutcome,
    StopCondition, Topology,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::parse_topology;

/// Arguments for the chat command
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Opening message for the chat
    #[arg(required = true)]
    pub seed: String,

    /// Roster file (JSON array of agent profiles)
    #[arg(short, long)]
    pub roster: PathBuf,

    /// Speaking topology (hub-and-spoke, round-robin)
    #[arg(short, long, value_parser = parse_topology)]
    pub topology: Option<Topology>,

    /// Maximum number of turns
    #[arg(short = 'n', long)]
    pub rounds: Option<usize>,

    /// Phrase that ends the chat early (empty to disable)
    #[arg(long)]
    pub stop: Option<String>,

    /// Write the full transcript as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Dry run - show the speaking order without running
    #[arg(long)]
    pub dry_run: bool,
}

impl ChatArgs {
    /// Execute the chat command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let roster = Roster::load(&self.roster)?;
        let topology = self.topology.unwrap_or(config.chat.topology);
        let rounds = self.rounds.unwrap_or(config.chat.rounds);
        let stop_phrase = self.stop.clone().unwrap_or_else(|| config.chat.stop_phrase.clone());

        let provider = ClaudeProvider::new(config.model.clone());
        let mut chat = GroupChat::from_roster(&roster, topology, &provider)?;

        if verbose {
            tracing::info!(
                roster = %self.roster.display(),
                topology = %topology,
                rounds,
                stop_phrase = %stop_phrase,
                "Starting group chat"
            );
        }

        println!("Huddle Chat");
        println!("===========");
        println!();
        println!("Seed: {}", self.seed);
        println!("Agents: {}", chat.graph().agents().join(", "));
        println!("Admin: {}", chat.admin());
        println!("Topology: {}", topology);
        println!("Rounds: {}", rounds);
        if !stop_phrase.is_empty() {
            println!("Stop phrase: {}", stop_phrase);
        }
        println!();

        if self.dry_run {
            println!("[Dry run] Speaking order:");
            for edge in chat.graph().edges() {
                println!("  {}", edge);
            }
            return Ok(());
        }

        let printer = tokio::spawn(print_events(chat.subscribe()));

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling chat");
                interrupt.cancel();
            }
        });

        let stop = if stop_phrase.is_empty() {
            StopCondition::Never
        } else {
            StopCondition::phrase(stop_phrase)
        };

        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut outcome = chat
            .run(self.seed.as_str(), rounds, stop, cancel.clone())
            .await?;

        while outcome.state == ChatState::AwaitingHumanInput {
            let agent = outcome
                .pending_input
                .as_ref()
                .map(|r| r.agent.clone())
                .unwrap_or_default();
            print!("\n{}> ", agent);
            std::io::stdout().flush()?;

            let line = tokio::select! {
                _ = cancel.cancelled() => None,
                line = read_input(&mut input, config.human.input_timeout) => line?,
            };

            outcome = match line {
                Some(text) => chat.provide_input(text, cancel.clone()).await?,
                None => chat.cancel_pending()?,
            };
        }

        if let Some(path) = &self.output {
            let json = serde_json::to_string_pretty(chat.history())?;
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), messages = chat.history().len(), "Transcript written");
        }

        // Closing the chat ends the event stream
        drop(chat);
        let _ = printer.await;

        print_summary(&outcome);

        if let Some(failure) = &outcome.failure {
            anyhow::bail!("Chat failed on {}: {}", failure.agent, failure.cause);
        }

        Ok(())
    }
}

/// Read one line of human input; `None` on end of input or timeout
async fn read_input(
    input: &mut Lines<BufReader<Stdin>>,
    timeout: Option<Duration>,
) -> anyhow::Result<Option<String>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, input.next_line()).await {
            Ok(line) => Ok(line?),
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "Timed out waiting for input");
                Ok(None)
            }
        },
        None => Ok(input.next_line().await?),
    }
}

/// Print turns as they stream in
async fn print_events(mut events: mpsc::UnboundedReceiver<ChatEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::TurnStarted { round, speaker } => {
                println!();
                println!("[{}] {}:", round, speaker);
            }
            ChatEvent::Fragment { text, .. } => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            ChatEvent::TurnCompleted { message, .. } => {
                // human input arrives whole, without fragments
                if message.role == Role::User {
                    print!("{}", message.content);
                }
                println!();
            }
            ChatEvent::InputRequested(request) => {
                tracing::debug!(agent = %request.agent, request_id = request.id, "Input requested");
            }
            ChatEvent::RunFinished { state } => {
                tracing::debug!(state = %state, "Run finished");
            }
        }
    }
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("Chat Summary");
    println!("============");
    println!("State: {}", outcome.state.description());
    println!("Rounds: {}", outcome.rounds);
    println!("Messages: {}", outcome.transcript.len());
    if let Some(failure) = &outcome.failure {
        println!("Failed agent: {}", failure.agent);
        println!("Cause: {}", failure.cause);
    }
    println!();
    println!("Transcript");
    println!("----------");
    println!("{}", outcome.summary());
}
