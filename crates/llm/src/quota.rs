//! Quota and rate-limit classification
//!
//! Providers report throttling in many shapes: HTTP 429 bodies, SDK
//! exception text, markdown banners printed by the engine. Classification is
//! substring based on lowercase text.

use std::sync::{Mutex, MutexGuard};

use crate::engine::DisplaySink;

const QUOTA_OR_RATE_PATTERNS: &[&str] = &[
    "you ran out of current quota",
    "insufficient_quota",
    "rate limit",
    "rate_limit",
    "quota exceeded",
    "quota_exceeded",
    "too many requests",
    "429",
    "resource_exhausted",
];

const GOOGLE_MARKERS: &[&str] = &[
    "resource_exhausted",
    "generativelanguage.googleapis.com",
    "google.api_core",
    "googleapis.com",
    "gemini",
    "google",
];

/// Detect Google/Gemini quota or rate-limit signals.
pub fn is_google_quota_signal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return false;
    }
    if lowered.contains("resource_exhausted") {
        return true;
    }
    GOOGLE_MARKERS.iter().any(|m| lowered.contains(m))
        && QUOTA_OR_RATE_PATTERNS.iter().any(|m| lowered.contains(m))
}

/// Returns true if the text indicates quota or rate-limit exhaustion.
pub fn is_quota_or_rate_limit_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return false;
    }
    is_google_quota_signal(&lowered) || QUOTA_OR_RATE_PATTERNS.iter().any(|m| lowered.contains(m))
}

#[derive(Debug, Default)]
struct QuotaState {
    detected: bool,
    text: String,
}

/// Per-request quota flag.
///
/// Installed as the engine's display sink so throttling banners are captured
/// instead of printed, and marked directly by the worker when an engine
/// error classifies as quota.
#[derive(Debug, Default)]
pub struct QuotaSignal {
    state: Mutex<QuotaState>,
}

impl QuotaSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a quota signal. Empty text keeps the previously captured text.
    pub fn mark(&self, text: &str) {
        let mut state = self.lock();
        state.detected = true;
        if !text.is_empty() {
            state.text = text.to_string();
        }
        tracing::debug!("Quota signal recorded");
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.detected = false;
        state.text.clear();
    }

    pub fn is_detected(&self) -> bool {
        self.lock().detected
    }

    /// Text of the most recent signal.
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }
}

impl DisplaySink for QuotaSignal {
    fn display(&self, text: &str) {
        if is_quota_or_rate_limit_message(text) {
            self.mark(text);
        }
    }
}
