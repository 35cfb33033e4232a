//! Agent profiles and rosters
//!
//! A profile is the durable description of an agent. A roster is the ordered,
//! validated list of profiles a group chat is built from. Rosters are stored as
//! JSON arrays of profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Which class of model an agent runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Advanced,
    Basic,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Advanced => write!(f, "advanced"),
            ModelTier::Basic => write!(f, "basic"),
        }
    }
}

/// Sampling temperature used when a profile does not set one
pub(crate) const DEFAULT_TEMPERATURE: f32 = 0.7;

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Durable description of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    /// Unique name within a chat
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Persona given to the model as system context
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub model: ModelTier,

    /// Capability names the agent may invoke
    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// The admin of the chat
    #[serde(default)]
    pub is_primary: bool,

    /// Turns are filled by a human instead of a model
    #[serde(default)]
    pub is_user_proxy: bool,
}

impl AgentProfile {
    /// Create a profile with defaults for everything but the name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            model: ModelTier::default(),
            plugins: Vec::new(),
            temperature: default_temperature(),
            is_primary: false,
            is_user_proxy: false,
        }
    }

    pub fn with_persona(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_model(mut self, tier: ModelTier) -> Self {
        self.model = tier;
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<String>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Mark as the chat admin
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Mark as a human proxy
    pub fn user_proxy(mut self) -> Self {
        self.is_user_proxy = true;
        self
    }
}

/// Ordered, validated set of agent profiles
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    profiles: Vec<AgentProfile>,
    admin: usize,
}

impl Roster {
    /// Validate profiles and pick the admin
    ///
    /// The admin is the profile flagged `isPrimary`, or the first profile when
    /// none is flagged.
    pub fn new(profiles: Vec<AgentProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(Error::Config("Roster is empty".to_string()));
        }

        for (i, profile) in profiles.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(Error::Config(format!("Agent #{} has no name", i + 1)));
            }
            if profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(Error::Config(format!(
                    "Duplicate agent name '{}'",
                    profile.name
                )));
            }
        }

        let primaries: Vec<usize> = profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_primary)
            .map(|(i, _)| i)
            .collect();

        let admin = match primaries.as_slice() {
            [] => 0,
            [only] => *only,
            _ => {
                return Err(Error::Config(format!(
                    "Only one primary agent is allowed, found {}",
                    primaries.len()
                )))
            }
        };

        if profiles[admin].is_user_proxy {
            return Err(Error::Config(format!(
                "Admin '{}' cannot be a human proxy",
                profiles[admin].name
            )));
        }

        Ok(Self { profiles, admin })
    }

    /// Parse a JSON array of profiles
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<AgentProfile> = serde_json::from_str(json)?;
        Self::new(profiles)
    }

    /// Load a roster from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_json(&contents)
            .map_err(|e| Error::Config(format!("Invalid roster {}: {}", path.display(), e)))
    }

    /// Serialize back to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.profiles)?)
    }

    pub fn admin(&self) -> &AgentProfile {
        &self.profiles[self.admin]
    }

    /// Profiles in file order
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    /// Profiles with the admin first, the rest in file order
    pub fn chat_order(&self) -> Vec<&AgentProfile> {
        std::iter::once(self.admin())
            .chain(
                self.profiles
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != self.admin)
                    .map(|(_, p)| p),
            )
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
