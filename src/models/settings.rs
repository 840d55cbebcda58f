//! Settings Models
//!
//! Controller limits, timings and provider fallback configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controller configuration stored in settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Code-block groups allowed per request
    #[serde(default = "default_max_code_blocks")]
    pub max_code_blocks: usize,
    /// Executions allowed per command fingerprint per request
    #[serde(default = "default_repeat_limit")]
    pub repeat_limit: usize,
    /// Failed executions tolerated before stopping
    #[serde(default = "default_max_fix_retries")]
    pub max_fix_retries: usize,
    /// Stop as soon as a recognizable success is seen
    #[serde(default = "default_true")]
    pub stop_after_success: bool,
    /// Hard cap on admission wait
    #[serde(default = "default_queue_wait_cap_ms")]
    pub queue_wait_cap_ms: u64,
    /// How long one admission attempt waits before re-checking
    #[serde(default = "default_queue_poll_ms")]
    pub queue_poll_ms: u64,
    /// Minimum gap between `waiting_for_backend_slot` statuses
    #[serde(default = "default_queue_heartbeat_ms")]
    pub queue_heartbeat_ms: u64,
    /// Silence after which `backend_processing` is emitted
    #[serde(default = "default_backend_heartbeat_ms")]
    pub backend_heartbeat_ms: u64,
    /// Per-command timeout for the shell runner
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// LLM provider: "auto", "gemini", "openai", ...
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Configured model; empty means whatever the engine runs
    #[serde(default)]
    pub model: String,
    /// Providers whose quota failures trigger one fallback replay
    #[serde(default = "default_fallback_providers")]
    pub fallback_providers: Vec<String>,
    /// Model used for the fallback replay
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// Phrases in assistant text that mean the task is finished
    #[serde(default = "default_done_phrases")]
    pub done_phrases: Vec<String>,
    /// History entries summarized into the prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Characters kept per history entry
    #[serde(default = "default_history_entry_chars")]
    pub history_entry_chars: usize,
}

fn default_max_code_blocks() -> usize {
    3
}

fn default_repeat_limit() -> usize {
    1
}

fn default_max_fix_retries() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_queue_wait_cap_ms() -> u64 {
    600_000
}

fn default_queue_poll_ms() -> u64 {
    5_000
}

fn default_queue_heartbeat_ms() -> u64 {
    20_000
}

fn default_backend_heartbeat_ms() -> u64 {
    60_000
}

fn default_command_timeout_ms() -> u64 {
    25_000
}

fn default_provider() -> String {
    "auto".to_string()
}

fn default_fallback_providers() -> Vec<String> {
    vec!["gemini".to_string()]
}

fn default_fallback_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_done_phrases() -> Vec<String> {
    [
        "task is done",
        "done",
        "completed",
        "finished",
        "top 5 process",
        "top five process",
        "تم التنفيذ",
        "اكتمل التنفيذ",
        "انتهيت من التنفيذ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_history_limit() -> usize {
    10
}

fn default_history_entry_chars() -> usize {
    300
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_code_blocks: default_max_code_blocks(),
            repeat_limit: default_repeat_limit(),
            max_fix_retries: default_max_fix_retries(),
            stop_after_success: true,
            queue_wait_cap_ms: default_queue_wait_cap_ms(),
            queue_poll_ms: default_queue_poll_ms(),
            queue_heartbeat_ms: default_queue_heartbeat_ms(),
            backend_heartbeat_ms: default_backend_heartbeat_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            provider: default_provider(),
            model: String::new(),
            fallback_providers: default_fallback_providers(),
            fallback_model: default_fallback_model(),
            done_phrases: default_done_phrases(),
            history_limit: default_history_limit(),
            history_entry_chars: default_history_entry_chars(),
        }
    }
}

impl ControllerSettings {
    /// Clamp limits to usable values. Applied by the controller before use.
    pub fn normalized(mut self) -> Self {
        self.max_code_blocks = self.max_code_blocks.max(1);
        self.repeat_limit = self.repeat_limit.max(1);
        self.queue_poll_ms = self.queue_poll_ms.max(1);
        self.queue_heartbeat_ms = self.queue_heartbeat_ms.max(1);
        self.backend_heartbeat_ms = self.backend_heartbeat_ms.max(1);
        self.provider = self.provider.trim().to_lowercase();
        self.fallback_providers = self
            .fallback_providers
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self.done_phrases = self
            .done_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.max_code_blocks == 0 {
            return Err("max_code_blocks must be at least 1".to_string());
        }
        if self.repeat_limit == 0 {
            return Err("repeat_limit must be at least 1".to_string());
        }
        if self.queue_poll_ms == 0 || self.queue_heartbeat_ms == 0 || self.backend_heartbeat_ms == 0 {
            return Err("poll and heartbeat intervals must be positive".to_string());
        }
        if self.queue_poll_ms > self.queue_wait_cap_ms {
            return Err(format!(
                "queue_poll_ms ({}) must not exceed queue_wait_cap_ms ({})",
                self.queue_poll_ms, self.queue_wait_cap_ms
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err("command_timeout_ms must be positive".to_string());
        }
        if self.fallback_model.trim().is_empty() {
            return Err("fallback_model must not be empty".to_string());
        }
        Ok(())
    }

    pub fn queue_wait_cap(&self) -> Duration {
        Duration::from_millis(self.queue_wait_cap_ms)
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }

    pub fn queue_heartbeat(&self) -> Duration {
        Duration::from_millis(self.queue_heartbeat_ms)
    }

    pub fn backend_heartbeat(&self) -> Duration {
        Duration::from_millis(self.backend_heartbeat_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Fence markers allowed in forwarded text before the request is stopped.
    pub fn fence_limit(&self) -> usize {
        self.max_code_blocks * 2 + 2
    }

    /// Provider in effect for a request. "auto" is resolved from the model
    /// name, falling back to the engine's runtime model.
    pub fn resolved_provider(&self, runtime_model: &str) -> String {
        let provider = self.provider.trim().to_lowercase();
        if !provider.is_empty() && provider != "auto" {
            return provider;
        }
        let model = self.resolved_model(runtime_model).to_lowercase();
        if model.contains("gemini") {
            "gemini".to_string()
        } else {
            "auto".to_string()
        }
    }

    /// Model in effect for a request: the configured one, else the engine's.
    pub fn resolved_model(&self, runtime_model: &str) -> String {
        if self.model.trim().is_empty() {
            runtime_model.to_string()
        } else {
            self.model.clone()
        }
    }
}
