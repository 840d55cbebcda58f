//! Completion Detector
//!
//! Best-effort auto-stop heuristics. Keeps a trailing window of forwarded
//! assistant text and of console output, and decides after each console end
//! (and after each forwarded text chunk) whether the request should stop.

use interpreter_bridge_core::text::append_window;
use interpreter_bridge_tools::fingerprint::Fingerprints;
use interpreter_bridge_tools::summary::{looks_like_error_output, looks_like_process_snapshot};

use crate::models::settings::ControllerSettings;

/// Trailing assistant text kept for done-phrase checks.
pub const TEXT_WINDOW_CHARS: usize = 1_200;

/// Trailing console output kept for classification.
pub const CONSOLE_WINDOW_CHARS: usize = 4_000;

/// Outcome of a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionVerdict {
    Continue,
    /// A success artifact or done phrase was seen
    Succeeded,
    /// Failed executions exceeded the retry budget
    TooManyErrors { failures: usize },
}

#[derive(Debug, Clone)]
pub struct CompletionDetector {
    max_fix_retries: usize,
    stop_after_success: bool,
    done_phrases: Vec<String>,
    text_window: String,
    console_output: String,
    failures: usize,
    saw_execution_complete: bool,
}

impl CompletionDetector {
    pub fn new(settings: &ControllerSettings) -> Self {
        Self {
            max_fix_retries: settings.max_fix_retries,
            stop_after_success: settings.stop_after_success,
            done_phrases: settings
                .done_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            text_window: String::new(),
            console_output: String::new(),
            failures: 0,
            saw_execution_complete: false,
        }
    }

    /// Start of a console execution: forget the previous output.
    pub fn begin_console(&mut self) {
        self.console_output.clear();
    }

    pub fn record_console_output(&mut self, text: &str) {
        append_window(&mut self.console_output, "\n", text, CONSOLE_WINDOW_CHARS);
    }

    /// Remember forwarded assistant text.
    pub fn observe_text(&mut self, text: &str) {
        append_window(&mut self.text_window, " ", text, TEXT_WINDOW_CHARS);
    }

    pub fn contains_done_signal(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.done_phrases.iter().any(|p| lowered.contains(p.as_str()))
    }

    /// Check after a console execution ended. `last` holds the fingerprints
    /// of the code block that produced the output.
    pub fn on_console_end(&mut self, last: &Fingerprints) -> CompletionVerdict {
        self.saw_execution_complete = true;

        if looks_like_error_output(&self.console_output) {
            self.failures += 1;
            tracing::debug!(failures = self.failures, "Execution output looks like an error");
            if self.failures > self.max_fix_retries {
                return CompletionVerdict::TooManyErrors {
                    failures: self.failures,
                };
            }
            return CompletionVerdict::Continue;
        }

        if !self.stop_after_success {
            return CompletionVerdict::Continue;
        }

        let listed_processes = looks_like_process_snapshot(&self.console_output)
            && last
                .iter()
                .any(|fp| fp.starts_with("get-process") || fp == "tasklist");
        if listed_processes || self.contains_done_signal(&self.text_window) {
            return CompletionVerdict::Succeeded;
        }
        CompletionVerdict::Continue
    }

    /// Check after forwarded text. Only fires once something has executed.
    pub fn after_text(&self) -> CompletionVerdict {
        if self.saw_execution_complete && self.contains_done_signal(&self.text_window) {
            CompletionVerdict::Succeeded
        } else {
            CompletionVerdict::Continue
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn text_window(&self) -> &str {
        &self.text_window
    }

    pub fn console_output(&self) -> &str {
        &self.console_output
    }
}
