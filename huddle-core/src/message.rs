//! Message and history model
//!
//! History is append-only: a message enters it once its turn has completed and
//! is never edited afterwards. Insertion order is the conversation order every
//! later turn sees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        write!(f, "{}", name)
    }
}

/// Who wrote a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Author {
    /// The person who started the conversation
    User,
    /// A named agent in the roster
    Agent(String),
}

impl Author {
    /// Create an agent author
    pub fn agent(name: impl Into<String>) -> Self {
        Author::Agent(name.into())
    }

    /// Display name of the author
    pub fn name(&self) -> &str {
        match self {
            Author::User => "user",
            Author::Agent(name) => name,
        }
    }

    /// Check whether this author is the given agent
    pub fn is_agent(&self, name: &str) -> bool {
        matches!(self, Author::Agent(n) if n == name)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single authored message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the session history, assigned on append
    pub sequence: u64,
    pub author: Author,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message that has not been appended to a history yet
    pub fn new(author: Author, role: Role, content: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            author,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// A message typed by the user
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Author::User, Role::User, content)
    }

    /// A message produced by an automated agent
    pub fn assistant(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Author::agent(agent), Role::Assistant, content)
    }

    /// Render as `author: content`, used for summaries and prompts
    pub fn format(&self) -> String {
        format!("{}: {}", self.author, self.content)
    }
}

/// Ordered, append-only message history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed message, stamping its sequence number
    pub fn push(&mut self, mut message: Message) -> &Message {
        message.sequence = self.messages.len() as u64;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages from `start` onwards
    pub fn since(&self, start: usize) -> &[Message] {
        &self.messages[start.min(self.messages.len())..]
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Render the whole history as a plain-text transcript
    pub fn transcript(&self) -> String {
        format_transcript(&self.messages)
    }
}

/// Render messages one per line as `author: content`
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::format)
        .collect::<Vec<_>>()
        .join("\n")
}
