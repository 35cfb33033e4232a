//! Streaming and parsing of the Claude Code JSON stream format

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::{Error, Result};

/// One line of `claude --output-format stream-json`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Session header
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Assistant text output
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },

    /// The model invoked a tool
    ToolUse {
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    /// Output of that tool
    ToolResult {
        #[serde(default)]
        output: String,
        #[serde(default)]
        is_error: bool,
    },

    /// Final result
    Result {
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },

    /// Any other line type; ignored
    #[serde(other)]
    Unknown,
}

/// Body of an assistant line
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: AssistantContent,
}

/// Content is either plain text or a list of typed blocks
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AssistantContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for AssistantContent {
    fn default() -> Self {
        AssistantContent::Text(String::new())
    }
}

impl AssistantContent {
    /// Concatenated text of the message
    pub fn text(&self) -> String {
        match self {
            AssistantContent::Text(text) => text.clone(),
            AssistantContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Other => None,
                })
                .collect(),
        }
    }
}

/// One block of assistant content
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Receives parsed stream lines in order
pub trait StreamHandler: Send {
    /// Session metadata
    fn on_system(&mut self, _subtype: Option<&str>, _session_id: Option<&str>) {}

    /// A piece of the reply text
    fn on_assistant_text(&mut self, text: &str);

    /// A tool call
    fn on_tool_use(&mut self, _tool: &str, _input: &serde_json::Value) {}

    /// A tool's output
    fn on_tool_result(&mut self, _output: &str, _is_error: bool) {}

    /// Final line of the stream
    fn on_complete(&mut self, _is_error: bool, _result: Option<&str>, _duration_ms: Option<u64>) {}

    /// A line that is not valid stream-json; streaming continues
    fn on_parse_error(&mut self, _line: &str, _error: &serde_json::Error) {}
}

/// Line-by-line reader over a stream-json source
pub struct OutputStreamer<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> OutputStreamer<R> {
    /// Create a new output streamer, usually over a child process stdout
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Read lines until EOF, dispatching each to `handler`
    ///
    /// Returns when the source reaches EOF
    pub async fn stream<H: StreamHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await.map_err(Error::Io)?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<StreamMessage>(trimmed) {
                Ok(msg) => dispatch_message(handler, msg),
                Err(e) => handler.on_parse_error(trimmed, &e),
            }
        }

        Ok(())
    }
}

fn dispatch_message<H: StreamHandler + ?Sized>(handler: &mut H, msg: StreamMessage) {
    match msg {
        StreamMessage::System {
            subtype,
            session_id,
        } => {
            handler.on_system(subtype.as_deref(), session_id.as_deref());
        }
        StreamMessage::Assistant { message } => {
            let text = message.content.text();
            if !text.is_empty() {
                handler.on_assistant_text(&text);
            }
        }
        StreamMessage::ToolUse { tool, input } => {
            handler.on_tool_use(&tool, &input);
        }
        StreamMessage::ToolResult { output, is_error } => {
            handler.on_tool_result(&output, is_error);
        }
        StreamMessage::Result {
            is_error,
            result,
            duration_ms,
        } => {
            handler.on_complete(is_error, result.as_deref(), duration_ms);
        }
        StreamMessage::Unknown => {}
    }
}
