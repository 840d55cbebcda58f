//! Command and intent types

use serde::{Deserialize, Serialize};

/// Languages the controller can execute itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
    PowerShell,
    Python,
}

impl ScriptLanguage {
    /// Map a payload's `language` field. An empty value means PowerShell.
    pub fn parse(language: &str) -> Option<Self> {
        match language.trim().to_lowercase().as_str() {
            "" | "powershell" | "pwsh" | "ps1" => Some(ScriptLanguage::PowerShell),
            "python" | "py" => Some(ScriptLanguage::Python),
            _ => None,
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            ScriptLanguage::PowerShell => "run_powershell",
            ScriptLanguage::Python => "run_python",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ScriptLanguage::PowerShell => "PowerShell",
            ScriptLanguage::Python => "Python",
        }
    }
}

/// Where a structured command was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Parsed tool call in assistant text
    StructuredPayload,
    /// Regex salvage of a mangled tool call in assistant text
    MalformedPayloadFallback,
    /// Parsed tool call inside an engine code block
    CodeBlockPayload,
    /// Regex salvage inside an engine code block
    CodeBlockFallback,
    /// Salvage of the leftover buffer after the stream ended
    EndOfStreamFallback,
}

impl CommandSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandSource::StructuredPayload => "structured_payload",
            CommandSource::MalformedPayloadFallback => "malformed_payload_fallback",
            CommandSource::CodeBlockPayload => "code_block_payload",
            CommandSource::CodeBlockFallback => "code_block_fallback",
            CommandSource::EndOfStreamFallback => "end_of_stream_fallback",
        }
    }
}

/// `{language, code}` as found in a payload, before the language is vetted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub language: String,
    pub code: String,
}

/// A command the controller may run on the user's machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredCommand {
    pub language: ScriptLanguage,
    pub code: String,
    pub source: CommandSource,
}

impl StructuredCommand {
    pub fn new(language: ScriptLanguage, code: impl Into<String>, source: CommandSource) -> Self {
        Self {
            language,
            code: code.into(),
            source,
        }
    }

    pub fn powershell(code: impl Into<String>, source: CommandSource) -> Self {
        Self::new(ScriptLanguage::PowerShell, code, source)
    }

    pub fn python(code: impl Into<String>, source: CommandSource) -> Self {
        Self::new(ScriptLanguage::Python, code, source)
    }
}

/// What a piece of assistant text turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionIntent {
    PlainText { content: String },
    StructuredCommand(StructuredCommand),
}
