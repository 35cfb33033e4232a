//! Stop conditions evaluated after each committed turn

use std::fmt;
use std::sync::Arc;

use crate::message::Message;

/// Predicate over the latest committed message that ends a run early
#[derive(Clone)]
pub enum StopCondition {
    /// Never stop early; only the round budget ends the run
    Never,
    /// Case-sensitive substring match on the message content
    Phrase(String),
    /// Arbitrary predicate
    Custom(Arc<dyn Fn(&Message) -> bool + Send + Sync>),
}

impl StopCondition {
    /// Stop when a message contains `phrase`
    pub fn phrase(phrase: impl Into<String>) -> Self {
        StopCondition::Phrase(phrase.into())
    }

    pub fn custom(predicate: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        StopCondition::Custom(Arc::new(predicate))
    }

    pub fn is_met(&self, message: &Message) -> bool {
        match self {
            StopCondition::Never => false,
            // an empty phrase would match every message
            StopCondition::Phrase(phrase) => {
                !phrase.is_empty() && message.content.contains(phrase.as_str())
            }
            StopCondition::Custom(predicate) => predicate(message),
        }
    }

    /// The phrase agents are told to emit, if any
    pub fn as_phrase(&self) -> Option<&str> {
        match self {
            StopCondition::Phrase(p) if !p.is_empty() => Some(p),
            _ => None,
        }
    }
}

impl Default for StopCondition {
    fn default() -> Self {
        StopCondition::phrase("[STOP]")
    }
}

impl fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCondition::Never => write!(f, "Never"),
            StopCondition::Phrase(p) => f.debug_tuple("Phrase").field(p).finish(),
            StopCondition::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
