//! Claude Code backend
//!
//! Each turn spawns `claude --print` with the transcript as the prompt and the
//! persona appended to the system prompt, then forwards assistant text from the
//! stream-json output as fragments. The child is killed when the turn future is
//! dropped, which is how cancellation reaches the process.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::model::{CompletionRequest, FragmentHandler, LanguageModel, ModelProvider};
use super::output::{OutputStreamer, StreamHandler};
use super::profile::{AgentProfile, DEFAULT_TEMPERATURE};
use super::prompts;
use crate::config::ModelConfig;
use crate::{Error, Result};

/// Language model backed by the Claude Code CLI
#[derive(Debug, Clone)]
pub struct ClaudeModel {
    claude_path: String,
    model: Option<String>,
}

impl ClaudeModel {
    /// Create a new Claude backend with default settings
    pub fn new() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None,
        }
    }

    /// Use a custom path to the claude executable
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.claude_path = path.into();
        self
    }

    /// Use a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn claude_path(&self) -> &str {
        &self.claude_path
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Build the command for one turn, without the prompt argument
    fn build_command(&self, request: &CompletionRequest) -> Command {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("--print")
            .arg("--verbose")
            .arg("--output-format")
            .arg("stream-json");

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        if !request.system_prompt.is_empty() {
            cmd.arg("--append-system-prompt").arg(&request.system_prompt);
        }

        if !request.plugins.is_empty() {
            cmd.arg("--allowedTools").arg(request.plugins.join(","));
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

impl Default for ClaudeModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards assistant text to the turn's fragment handler
struct ForwardFragments<'a> {
    agent: &'a str,
    inner: &'a mut dyn FragmentHandler,
    failed: Option<String>,
}

impl StreamHandler for ForwardFragments<'_> {
    fn on_system(&mut self, subtype: Option<&str>, session_id: Option<&str>) {
        tracing::debug!(agent = %self.agent, ?subtype, ?session_id, "claude session started");
    }

    fn on_assistant_text(&mut self, text: &str) {
        self.inner.on_fragment(text);
    }

    fn on_tool_use(&mut self, tool: &str, _input: &serde_json::Value) {
        tracing::debug!(agent = %self.agent, tool, "claude invoked tool");
    }

    fn on_tool_result(&mut self, _output: &str, is_error: bool) {
        if is_error {
            tracing::warn!(agent = %self.agent, "claude tool call failed");
        }
    }

    fn on_complete(&mut self, is_error: bool, result: Option<&str>, duration_ms: Option<u64>) {
        tracing::debug!(agent = %self.agent, is_error, ?duration_ms, "claude turn finished");
        if is_error {
            self.failed = Some(result.unwrap_or("unknown error").to_string());
        }
    }

    fn on_parse_error(&mut self, line: &str, error: &serde_json::Error) {
        tracing::warn!(agent = %self.agent, %error, line, "skipping malformed stream line");
    }
}

#[async_trait]
impl LanguageModel for ClaudeModel {
    fn name(&self) -> &str {
        "claude"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        handler: &mut dyn FragmentHandler,
    ) -> Result<()> {
        if temperature_ignored(request) {
            tracing::debug!(
                agent = %request.agent,
                temperature = request.temperature,
                "claude CLI has no temperature flag, using its default"
            );
        }

        let mut cmd = self.build_command(request);
        cmd.arg(prompts::turn_prompt(&request.agent, &request.messages));

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Agent(format!(
                    "Claude executable not found at '{}'. Is Claude Code installed?",
                    self.claude_path
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("Failed to capture claude stdout".to_string()))?;

        // Drain stderr alongside stdout
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        let mut forward = ForwardFragments {
            agent: &request.agent,
            inner: handler,
            failed: None,
        };
        OutputStreamer::new(stdout).stream(&mut forward).await?;

        let status = child.wait().await.map_err(Error::Io)?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(Error::Agent(format!(
                "claude exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        if let Some(reason) = forward.failed {
            return Err(Error::Agent(format!("claude reported an error: {}", reason)));
        }

        Ok(())
    }
}

/// The CLI exposes no sampling temperature, so only the default is honoured
fn temperature_ignored(request: &CompletionRequest) -> bool {
    (request.temperature - DEFAULT_TEMPERATURE).abs() > f32::EPSILON
}

/// Hands out one Claude model per agent, picking the model name by tier
#[derive(Debug, Clone, Default)]
pub struct ClaudeProvider {
    config: ModelConfig,
}

impl ClaudeProvider {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelProvider for ClaudeProvider {
    fn model_for(&self, profile: &AgentProfile) -> Arc<dyn LanguageModel> {
        let mut model = ClaudeModel::new().with_path(&self.config.claude_path);
        if let Some(name) = self.config.model_for(profile.model) {
            model = model.with_model(name);
        }
        Arc::new(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ModelTier;
    use crate::message::Message;

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent: "Writer".to_string(),
            system_prompt: "# Writer".to_string(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            plugins: vec!["WikiChat".to_string(), "Search".to_string()],
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_command_flags() {
        let model = ClaudeModel::new().with_model("opus");
        let args = args(&model.build_command(&request()));

        assert_eq!(&args[..4], &["--print", "--verbose", "--output-format", "stream-json"]);
        assert!(args.windows(2).any(|w| w == ["--model", "opus"]));
        assert!(args.windows(2).any(|w| w == ["--append-system-prompt", "# Writer"]));
        assert!(args.windows(2).any(|w| w == ["--allowedTools", "WikiChat,Search"]));
    }

    #[test]
    fn test_build_command_without_plugins() {
        let mut req = request();
        req.plugins.clear();
        let args = args(&ClaudeModel::new().build_command(&req));
        assert!(!args.contains(&"--allowedTools".to_string()));
        assert!(!args.contains(&"--model".to_string()));
    }

    #[test]
    fn test_provider_picks_model_by_tier() {
        let provider = ClaudeProvider::new(ModelConfig {
            claude_path: "claude".to_string(),
            advanced: Some("opus".to_string()),
            basic: Some("haiku".to_string()),
        });
        let profile = AgentProfile::new("Editor").with_model(ModelTier::Basic);
        assert_eq!(provider.model_for(&profile).name(), "claude");
    }

    struct Sink(String);

    impl FragmentHandler for Sink {
        fn on_fragment(&mut self, text: &str) {
            self.0.push_str(text);
        }
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let model = ClaudeModel::new().with_path("/usr/bin/nonexistent-claude-binary");
        let mut sink = Sink(String::new());
        let err = model.stream(&request(), &mut sink).await.unwrap_err();
        assert!(matches!(err, Error::Agent(_)));
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_temperature_ignored_only_when_not_default() {
        let mut req = request();
        assert!(!temperature_ignored(&req));
        req.temperature = 0.2;
        assert!(temperature_ignored(&req));
    }

    #[cfg(unix)]
    fn fake_claude(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_stderr_does_not_stall_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_claude(
            dir.path(),
            "head -c 262144 /dev/zero | tr '\\0' 'e' >&2\n\
             echo '{\"type\":\"assistant\",\"message\":{\"content\":\"hello\"}}'\n\
             echo '{\"type\":\"result\",\"is_error\":false}'",
        );
        let model = ClaudeModel::new().with_path(path);
        let mut sink = Sink(String::new());

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            model.stream(&request(), &mut sink),
        )
        .await
        .expect("stream stalled");

        result.unwrap();
        assert_eq!(sink.0, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_claude(dir.path(), "echo 'rate limited' >&2\nexit 3");
        let model = ClaudeModel::new().with_path(path);
        let mut sink = Sink(String::new());

        let err = model.stream(&request(), &mut sink).await.unwrap_err();
        match err {
            Error::Agent(message) => assert!(message.contains("rate limited")),
            other => panic!("Expected agent error, got {:?}", other),
        }
    }
}
