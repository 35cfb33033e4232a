//! Error types for Huddle

use thiserror::Error;

/// Result type alias for Huddle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Huddle operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Agent or language-model invocation error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error (config file, roster, session setup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transition graph cannot produce a speaker
    #[error("Transition graph error: {0}")]
    Graph(String),

    /// Input was provided while no human-proxy turn was pending
    #[error("No human input is pending")]
    NoPendingInput,

    /// Session lifecycle transition that is not allowed
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
