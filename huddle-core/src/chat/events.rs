//! Turn lifecycle events for observers
//!
//! Events are for presentation only. Receivers cannot influence the session;
//! a dropped receiver simply stops getting events.

use tokio::sync::mpsc;

use super::state::ChatState;
use crate::agent::InputRequest;
use crate::message::Message;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A speaker was selected and its turn began
    TurnStarted { round: usize, speaker: String },
    /// Partial text from a streaming speaker; never part of history
    Fragment { speaker: String, text: String },
    /// The speaker's message was committed to history
    TurnCompleted { round: usize, message: Message },
    /// A human-proxy agent is waiting for input
    InputRequested(InputRequest),
    /// The run stopped in the given state
    RunFinished { state: ChatState },
}

/// Fan-out point for chat events
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Vec<mpsc::UnboundedSender<ChatEvent>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatEvent> {
        self.prune();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send an event to every live receiver
    pub fn emit(&self, event: ChatEvent) {
        for tx in &self.subscribers {
            // closed receivers are pruned lazily on the next subscribe
            let _ = tx.send(event.clone());
        }
    }

    /// Convenience for streaming text
    pub fn fragment(&self, speaker: &str, text: &str) {
        if self.subscribers.is_empty() {
            return;
        }
        self.emit(ChatEvent::Fragment {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    /// Drop senders whose receiver is gone
    pub fn prune(&mut self) {
        self.subscribers.retain(|tx| !tx.is_closed());
    }
}
