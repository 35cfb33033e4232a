//! Configuration management for Huddle
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (HUDDLE_*)
//! 3. Config file (~/.config/huddle/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::ModelTier;
use crate::chat::Topology;
use crate::{Error, Result};

/// Language-model backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the claude executable
    pub claude_path: String,

    /// Model used by agents on the advanced tier
    pub advanced: Option<String>,

    /// Model used by agents on the basic tier
    pub basic: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            claude_path: "claude".to_string(),
            advanced: None, // Let claude use its default
            basic: None,
        }
    }
}

impl ModelConfig {
    /// Model name for a tier, if one is configured
    pub fn model_for(&self, tier: ModelTier) -> Option<&str> {
        match tier {
            ModelTier::Advanced => self.advanced.as_deref(),
            ModelTier::Basic => self.basic.as_deref().or(self.advanced.as_deref()),
        }
    }
}

/// Group chat defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Round budget for a run
    pub rounds: usize,

    /// Phrase that ends a run early
    pub stop_phrase: String,

    /// Who may speak after whom
    pub topology: Topology,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            stop_phrase: "[STOP]".to_string(),
            topology: Topology::HubAndSpoke,
        }
    }
}

/// Human-proxy input settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HumanConfig {
    /// How long to wait for typed input before cancelling the run
    #[serde(with = "humantime_serde")]
    pub input_timeout: Option<Duration>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub chat: ChatConfig,
    pub human: HumanConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/huddle/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("huddle").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - HUDDLE_CLAUDE_PATH: Path to claude executable
    /// - HUDDLE_MODEL: Model for the advanced tier
    /// - HUDDLE_ROUNDS: Round budget
    /// - HUDDLE_STOP_PHRASE: Stop phrase
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(claude_path) = lookup("HUDDLE_CLAUDE_PATH") {
            self.model.claude_path = claude_path;
        }

        if let Some(model) = lookup("HUDDLE_MODEL") {
            self.model.advanced = Some(model);
        }

        if let Some(rounds) = lookup("HUDDLE_ROUNDS") {
            self.chat.rounds = rounds
                .parse()
                .map_err(|_| Error::Config(format!("HUDDLE_ROUNDS is not a number: {}", rounds)))?;
        }

        if let Some(stop) = lookup("HUDDLE_STOP_PHRASE") {
            self.chat.stop_phrase = stop;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, claude_path: Option<String>, model: Option<String>) -> Self {
        if let Some(path) = claude_path {
            self.model.claude_path = path;
        }

        if let Some(m) = model {
            self.model.advanced = Some(m);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(claude_path: Option<String>, model: Option<String>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(claude_path, model))
    }
}
