//! Prompt templates for automated agents
//!
//! Templates are embedded Markdown with `{{VARIABLE}}` placeholders.
//! `persona.md` becomes the system prompt, `turn.md` carries the transcript.

use std::collections::HashMap;

use crate::message::{format_transcript, Message};

const PERSONA_TEMPLATE: &str = include_str!("prompts/persona.md");
const TURN_TEMPLATE: &str = include_str!("prompts/turn.md");

/// Variable substitutions for a template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_agent(self, name: impl Into<String>) -> Self {
        self.with("AGENT_NAME", name)
    }

    pub fn with_persona(self, persona: &str) -> Self {
        let persona = if persona.trim().is_empty() {
            "(no persona given)"
        } else {
            persona.trim()
        };
        self.with("PERSONA", persona)
    }

    pub fn with_participants(self, participants: &[String]) -> Self {
        let list = participants
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        self.with("PARTICIPANTS", list)
    }

    pub fn with_stop_phrase(self, phrase: Option<&str>) -> Self {
        let instruction = match phrase {
            Some(p) => format!("When the task is finished, include `{}` in your message.", p),
            None => String::new(),
        };
        self.with("STOP_INSTRUCTION", instruction)
    }

    pub fn with_transcript(self, messages: &[Message]) -> Self {
        let transcript = if messages.is_empty() {
            "(no messages yet)".to_string()
        } else {
            format_transcript(messages)
        };
        self.with("TRANSCRIPT", transcript)
    }
}

/// System prompt for an agent's turn
pub fn persona_prompt(context: &PromptContext) -> String {
    render_template(PERSONA_TEMPLATE, context)
}

/// User prompt holding the transcript
pub fn turn_prompt(agent: &str, messages: &[Message]) -> String {
    let context = PromptContext::new()
        .with_agent(agent)
        .with_transcript(messages);
    render_template(TURN_TEMPLATE, &context)
}

/// Render a template string with variable substitution
///
/// Only the template is scanned. Substituted values are copied verbatim, so
/// braces inside a transcript or persona reach the model unchanged. Template
/// placeholders with no value become "(not specified)".
fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            result.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let name = &after[..close];
        if is_placeholder(name) {
            match context.variables.get(name) {
                Some(value) => result.push_str(value),
                None => result.push_str("(not specified)"),
            }
        } else {
            result.push_str(&rest[open..open + close + 4]);
        }
        rest = &after[close + 2..];
    }
    result.push_str(rest);

    result.trim_end().to_string()
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}
