//! Execution Request
//!
//! Immutable input to one controller run.

use serde::{Deserialize, Serialize};

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A user message plus the context it should be answered in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ExecutionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            system_prompt: None,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let req = ExecutionRequest::new("open explorer")
            .with_history(vec![HistoryEntry::user("hi")])
            .with_system_prompt("be brief");
        assert_eq!(req.message, "open explorer");
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_history_entry_defaults_role() {
        let entry: HistoryEntry = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(entry.role, "user");
        assert_eq!(entry.content, "hello");
    }
}
