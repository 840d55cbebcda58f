//! Stream Chunk and Output Event Types
//!
//! The engine yields loosely-shaped chunks: either a bare text delta or a
//! record with `role`/`type`/`content` and optional `format`/`start`/`end`
//! flags. `RawChunk` mirrors that wire shape; `StreamChunk::decode` turns it
//! into a closed set of variants at the boundary so nothing downstream has
//! to inspect field presence.
//!
//! `OutputEvent` is what the controller hands to its caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chunk exactly as the engine produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawChunk {
    /// Bare text delta
    Text(String),
    /// Structured record
    Record(ChunkRecord),
}

/// Structured chunk record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub end: bool,
}

impl ChunkRecord {
    /// Assistant prose chunk
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            kind: "message".to_string(),
            content: Some(Value::String(text.into())),
            ..Default::default()
        }
    }

    /// Assistant code chunk in the given language
    pub fn code(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            kind: "code".to_string(),
            content: Some(Value::String(text.into())),
            format: Some(language.into()),
            ..Default::default()
        }
    }

    /// Console execution start marker
    pub fn console_start() -> Self {
        Self {
            role: "computer".to_string(),
            kind: "console".to_string(),
            start: true,
            ..Default::default()
        }
    }

    /// Console output chunk
    pub fn console_output(text: impl Into<String>) -> Self {
        Self {
            role: "computer".to_string(),
            kind: "console".to_string(),
            content: Some(Value::String(text.into())),
            format: Some("output".to_string()),
            ..Default::default()
        }
    }

    /// Console execution end marker
    pub fn console_end() -> Self {
        Self {
            role: "computer".to_string(),
            kind: "console".to_string(),
            end: true,
            ..Default::default()
        }
    }

    /// Content rendered as text; `None` when absent or empty.
    pub fn content_text(&self) -> Option<String> {
        let text = match self.content.as_ref()? {
            Value::Null | Value::Bool(false) => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl From<ChunkRecord> for RawChunk {
    fn from(record: ChunkRecord) -> Self {
        RawChunk::Record(record)
    }
}

impl From<&str> for RawChunk {
    fn from(text: &str) -> Self {
        RawChunk::Text(text.to_string())
    }
}

/// Phase of an engine-side code execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolePhase {
    Start,
    Output,
    End,
}

/// Decoded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Prose from the assistant
    TextDelta { text: String },
    /// Piece of a code block the engine is about to run. `text` may be empty.
    CodeDelta { text: String, language: String },
    /// Console activity around an execution
    ConsoleEvent { phase: ConsolePhase, text: String },
}

impl StreamChunk {
    /// Decode a raw chunk. Returns `None` for chunks that carry nothing the
    /// controller acts on (empty text, unknown roles, empty messages).
    pub fn decode(raw: RawChunk) -> Option<Self> {
        match raw {
            RawChunk::Text(text) if !text.is_empty() => Some(StreamChunk::TextDelta { text }),
            RawChunk::Text(_) => None,
            RawChunk::Record(record) => Self::decode_record(record),
        }
    }

    fn decode_record(record: ChunkRecord) -> Option<Self> {
        match (record.role.as_str(), record.kind.as_str()) {
            ("computer", "console") => {
                let (phase, text) = if record.start {
                    (ConsolePhase::Start, String::new())
                } else if record.end {
                    (ConsolePhase::End, String::new())
                } else {
                    (ConsolePhase::Output, record.content_text()?)
                };
                Some(StreamChunk::ConsoleEvent { phase, text })
            }
            ("assistant", "code") => {
                let language = record
                    .format
                    .as_deref()
                    .filter(|f| !f.is_empty())
                    .unwrap_or("code")
                    .to_string();
                Some(StreamChunk::CodeDelta {
                    text: record.content_text().unwrap_or_default(),
                    language,
                })
            }
            ("assistant", "message") => record
                .content_text()
                .map(|text| StreamChunk::TextDelta { text }),
            _ => None,
        }
    }
}

/// Event delivered to the caller, in decision order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// User-visible text
    Message { text: String },

    /// A command is about to run
    ToolUse {
        name: String,
        label: String,
        #[serde(default)]
        input: Value,
    },

    /// A command finished
    ToolResult { name: String, label: String },

    /// Progress signal with no user-visible content (heartbeats, fallback notice)
    Status {
        label: String,
        #[serde(default)]
        metadata: Value,
    },

    /// Terminal, pre-localized failure text
    Error { text: String },
}

impl OutputEvent {
    pub fn message(text: impl Into<String>) -> Self {
        OutputEvent::Message { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        OutputEvent::Error { text: text.into() }
    }

    pub fn status(label: impl Into<String>, metadata: Value) -> Self {
        OutputEvent::Status {
            label: label.into(),
            metadata,
        }
    }

    /// Wire name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            OutputEvent::Message { .. } => "message",
            OutputEvent::ToolUse { .. } => "tool_use",
            OutputEvent::ToolResult { .. } => "tool_result",
            OutputEvent::Status { .. } => "status",
            OutputEvent::Error { .. } => "error",
        }
    }

    /// Returns true for tool or message events (anything beyond progress).
    pub fn is_content(&self) -> bool {
        !matches!(self, OutputEvent::Status { .. })
    }
}
