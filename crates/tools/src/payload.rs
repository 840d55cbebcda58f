//! Execute Payload Extraction
//!
//! Recovers `{language, code}` tool calls that a model printed as text
//! instead of calling a tool. Parsing runs three passes over the outermost
//! brace-delimited span, first success wins:
//! - Pass 1: strict JSON
//! - Pass 2: lenient literal syntax (single quotes, `True`/`False`/`None`,
//!   trailing commas) normalized to JSON
//! - Pass 3: regex salvage of one known-safe command shape
//!
//! `PayloadExtractor` adds the streaming part: it buffers shreds that look
//! like a payload in progress, suppresses them, and gives up on the buffer
//! once the stream clearly went back to prose.

use serde_json::Value;

use interpreter_bridge_core::text::keep_tail;

use crate::command::{CommandSource, ExecutionIntent, RawPayload, ScriptLanguage, StructuredCommand};
use crate::noise::{
    is_execute_fragment, looks_like_execute_continuation, looks_like_execute_noise,
    looks_like_payload_fragment, looks_like_raw_command_leak,
};
use crate::pattern::lazy_regex;
use crate::salvage::{salvage_powershell, salvage_python};

/// Maximum characters kept in the partial-payload buffer.
pub const PAYLOAD_BUFFER_CHARS: usize = 10_000;

lazy_regex!(language_field, r#"(?i)"?language"?\s*:\s*"?([a-zA-Z0-9_\-]+)"?"#);

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull `{language, code}` out of a parsed object, either top level or
/// nested under `arguments` of an `execute` call.
fn payload_from_value(value: &Value) -> Option<RawPayload> {
    let object = value.as_object()?;
    let name = object
        .get("name")
        .map(value_text)
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let args = match object.get("arguments") {
        Some(Value::Object(args)) => {
            if !name.is_empty() && name != "execute" {
                return None;
            }
            args
        }
        _ => object,
    };

    let language = args
        .get("language")
        .map(value_text)
        .unwrap_or_else(|| "powershell".to_string())
        .trim()
        .to_lowercase();
    let language = if language.is_empty() {
        "powershell".to_string()
    } else {
        language
    };
    let code = args.get("code")?.as_str()?.trim();
    if code.is_empty() {
        return None;
    }
    Some(RawPayload {
        language,
        code: code.to_string(),
    })
}

/// Rewrite lenient literal syntax into JSON. Returns `None` on unterminated strings.
fn normalize_literal(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => {
                            let escaped = chars.next()?;
                            match escaped {
                                '\'' => out.push('\''),
                                '"' => out.push_str("\\\""),
                                '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u' => {
                                    out.push('\\');
                                    out.push(escaped);
                                }
                                other => {
                                    out.push_str("\\\\");
                                    out.push(other);
                                }
                            }
                        }
                        '"' if quote == '\'' => out.push_str("\\\""),
                        ch if ch == quote => {
                            closed = true;
                            break;
                        }
                        ch => out.push(ch),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            '}' | ']' => {
                let kept = out.trim_end().trim_end_matches(',').len();
                out.truncate(kept);
                out.push(c);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    Some(out)
}

fn parse_candidate(raw: &str) -> Option<RawPayload> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => payload_from_value(&value),
        Err(_) => {
            let normalized = normalize_literal(raw)?;
            let value = serde_json::from_str::<Value>(&normalized).ok()?;
            payload_from_value(&value)
        }
    }
}

/// Extract a JSON-ish execute payload from assistant text.
pub fn extract_execute_payload(text: &str) -> Option<RawPayload> {
    if text.is_empty() {
        return None;
    }
    if !text.to_lowercase().contains("code") && !looks_like_payload_fragment(text) {
        return None;
    }

    let trimmed = text.trim();
    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text[start..=end].trim(),
        _ => trimmed,
    };

    for raw in [candidate, trimmed] {
        if let Some(payload) = parse_candidate(raw) {
            return Some(payload);
        }
    }

    let code = salvage_powershell(candidate).or_else(|| salvage_powershell(text))?;
    let haystack = format!("{}\n{}", candidate, text);
    let language = language_field()
        .and_then(|re| re.captures(&haystack))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "powershell".to_string());
    Some(RawPayload { language, code })
}

/// Result of feeding one chunk of assistant text to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Plain text (not payload-related) or a resolved command
    Intent(ExecutionIntent),
    /// Payload in a language the controller does not run
    UnsupportedLanguage(String),
    /// Part of a payload in progress; do not forward
    Suppressed,
}

/// Outcome of the end-of-stream salvage attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Nothing was buffered
    Empty,
    /// The leftover buffer yielded a command
    Resolved(StructuredCommand),
    /// Something was buffered but nothing could be recovered
    Unparseable,
}

/// Streaming classifier over assistant text chunks.
#[derive(Debug, Clone, Default)]
pub struct PayloadExtractor {
    buffer: String,
    capture_open: bool,
}

impl PayloadExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_capturing(&self) -> bool {
        self.capture_open
    }

    /// Drop the buffer, e.g. after a command ran.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.capture_open = false;
    }

    fn resolve(payload: RawPayload, source: CommandSource) -> Extraction {
        match ScriptLanguage::parse(&payload.language) {
            Some(language) => Extraction::Intent(ExecutionIntent::StructuredCommand(
                StructuredCommand::new(language, payload.code, source),
            )),
            None => Extraction::UnsupportedLanguage(payload.language),
        }
    }

    /// Classify one chunk of assistant text.
    pub fn observe(&mut self, text: &str) -> Extraction {
        if text.is_empty() {
            return Extraction::Intent(ExecutionIntent::PlainText {
                content: String::new(),
            });
        }

        let maybe_execute = is_execute_fragment(text) || looks_like_payload_fragment(text);
        let continuation = self.capture_open && looks_like_execute_continuation(text);
        let noisy = looks_like_execute_noise(text) || looks_like_raw_command_leak(text);
        if maybe_execute {
            self.capture_open = true;
        }

        if maybe_execute || continuation || noisy {
            let joined = format!("{}{}", self.buffer, text);
            self.buffer = keep_tail(joined.trim(), PAYLOAD_BUFFER_CHARS).to_string();
        } else if self.capture_open {
            tracing::debug!(
                buffered = self.buffer.len(),
                "Dropping stale payload buffer, stream returned to prose"
            );
            self.clear();
        }

        if let Some(payload) =
            extract_execute_payload(text).or_else(|| extract_execute_payload(&self.buffer))
        {
            return Self::resolve(payload, CommandSource::StructuredPayload);
        }
        if let Some(code) = salvage_powershell(&self.buffer) {
            return Extraction::Intent(ExecutionIntent::StructuredCommand(
                StructuredCommand::powershell(code, CommandSource::MalformedPayloadFallback),
            ));
        }
        if let Some(code) = salvage_python(&self.buffer) {
            return Extraction::Intent(ExecutionIntent::StructuredCommand(
                StructuredCommand::python(code, CommandSource::MalformedPayloadFallback),
            ));
        }

        if maybe_execute || continuation || noisy || looks_like_payload_fragment(text) {
            return Extraction::Suppressed;
        }
        Extraction::Intent(ExecutionIntent::PlainText {
            content: text.to_string(),
        })
    }

    /// Look for a payload inside a finished engine code block. Unsupported
    /// languages fall through to salvage here instead of stopping.
    pub fn extract_from_code_block(command: &str) -> Option<StructuredCommand> {
        if !is_execute_fragment(command) && !looks_like_execute_noise(command) {
            return None;
        }
        if let Some(payload) = extract_execute_payload(command) {
            if let Some(language) = ScriptLanguage::parse(&payload.language) {
                return Some(StructuredCommand::new(
                    language,
                    payload.code,
                    CommandSource::CodeBlockPayload,
                ));
            }
        }
        salvage_powershell(command)
            .map(|code| StructuredCommand::powershell(code, CommandSource::CodeBlockFallback))
            .or_else(|| {
                salvage_python(command)
                    .map(|code| StructuredCommand::python(code, CommandSource::CodeBlockFallback))
            })
    }

    /// Final salvage attempt once the stream has ended. Always leaves the
    /// buffer empty.
    pub fn finish(&mut self) -> FinishOutcome {
        if self.buffer.is_empty() {
            return FinishOutcome::Empty;
        }
        let outcome = salvage_powershell(&self.buffer)
            .map(|code| StructuredCommand::powershell(code, CommandSource::EndOfStreamFallback))
            .or_else(|| {
                salvage_python(&self.buffer)
                    .map(|code| StructuredCommand::python(code, CommandSource::EndOfStreamFallback))
            })
            .map_or(FinishOutcome::Unparseable, FinishOutcome::Resolved);
        self.clear();
        outcome
    }
}
