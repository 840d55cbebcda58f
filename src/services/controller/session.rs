//! Per-request session state
//!
//! Everything that changes while one request is served. Created after
//! admission, owned by the worker, dropped when the request ends.

use interpreter_bridge_tools::fingerprint::FingerprintGuard;
use interpreter_bridge_tools::payload::PayloadExtractor;

use crate::models::settings::ControllerSettings;
use crate::services::completion::CompletionDetector;
use crate::services::fallback::FallbackCoordinator;

#[derive(Debug)]
pub struct SessionState {
    pub extractor: PayloadExtractor,
    pub guard: FingerprintGuard,
    pub completion: CompletionDetector,
    pub fallback: FallbackCoordinator,

    /// Inside an engine code block
    pub in_code_block: bool,
    /// Text of the open code block
    pub code_parts: String,
    /// Language of the most recent code block
    pub current_language: Option<String>,
    /// `ToolUse` already emitted for the current engine execution
    pub shown_running: bool,
    pub code_blocks_seen: usize,
    pub fence_markers_seen: usize,
    /// One structured command already ran
    pub structured_done: bool,
    /// Set by any guard; halts chunk consumption
    pub stop_requested: bool,
}

impl SessionState {
    pub fn new(settings: &ControllerSettings) -> Self {
        Self {
            extractor: PayloadExtractor::new(),
            guard: FingerprintGuard::new(settings.repeat_limit),
            completion: CompletionDetector::new(settings),
            fallback: FallbackCoordinator::new(settings),
            in_code_block: false,
            code_parts: String::new(),
            current_language: None,
            shown_running: false,
            code_blocks_seen: 0,
            fence_markers_seen: 0,
            structured_done: false,
            stop_requested: false,
        }
    }

    /// Close the open code block and return its trimmed text.
    pub fn take_code_block(&mut self) -> Option<String> {
        if !self.in_code_block {
            return None;
        }
        self.in_code_block = false;
        let command = std::mem::take(&mut self.code_parts).trim().to_string();
        Some(command)
    }
}
