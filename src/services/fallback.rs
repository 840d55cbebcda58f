//! Quota Fallback Coordinator
//!
//! One-shot replay of a request against a fallback model when an eligible
//! provider reports quota or rate-limit exhaustion. The coordinator decides
//! whether to fall back and shapes the notices; the session worker owns the
//! replay itself and does the model swap through `ScopedModel`.

use serde_json::json;

use interpreter_bridge_core::error::BridgeError;
use interpreter_bridge_core::locale::Locale;
use interpreter_bridge_core::streaming::{OutputEvent, RawChunk, StreamChunk};
use interpreter_bridge_core::text::title_case;
use interpreter_bridge_llm::quota::QuotaSignal;
use interpreter_bridge_tools::noise::is_noisy_execution_text;

use crate::models::settings::ControllerSettings;

const OPENAI_ROUTE_PREFIX: &str = "openai/";

#[derive(Debug, Clone)]
pub struct FallbackCoordinator {
    providers: Vec<String>,
    fallback_model: String,
    attempted: bool,
}

impl FallbackCoordinator {
    pub fn new(settings: &ControllerSettings) -> Self {
        Self {
            providers: settings
                .fallback_providers
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            fallback_model: settings.fallback_model.clone(),
            attempted: false,
        }
    }

    pub fn is_eligible_provider(&self, provider: &str) -> bool {
        let provider = provider.to_lowercase();
        self.providers.iter().any(|p| *p == provider)
    }

    /// Eligible provider, no replay yet, and quota was signalled.
    pub fn should_fallback(&self, provider: &str, signal: &QuotaSignal) -> bool {
        !self.attempted && self.is_eligible_provider(provider) && signal.is_detected()
    }

    pub fn mark_attempted(&mut self) {
        self.attempted = true;
    }

    pub fn attempted(&self) -> bool {
        self.attempted
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// Model id to put on the engine. Keeps an `openai/` routing prefix when
    /// the runtime model uses one.
    pub fn runtime_model(&self, current: &str) -> String {
        if current.starts_with(OPENAI_ROUTE_PREFIX) {
            format!("{}{}", OPENAI_ROUTE_PREFIX, self.fallback_model)
        } else {
            self.fallback_model.clone()
        }
    }

    /// `<provider>_quota_fallback` status.
    pub fn status_event(&self, provider: &str, from_model: &str) -> OutputEvent {
        OutputEvent::status(
            format!("{}_quota_fallback", provider.to_lowercase()),
            json!({
                "from_model": from_model,
                "to_model": self.fallback_model,
            }),
        )
    }

    /// User-facing "retrying once" notice.
    pub fn retry_notice(&self, provider: &str, locale: Locale) -> String {
        match locale {
            Locale::English => format!(
                "🔁 {} quota reached. Retrying once with `{}`...",
                title_case(provider),
                self.fallback_model
            ),
            Locale::Arabic => format!(
                "🔁 تم تجاوز حد {}. أعيد المحاولة مرة واحدة عبر `{}`...",
                title_case(provider),
                self.fallback_model
            ),
        }
    }

    /// Final quota error for the request.
    pub fn quota_error(&self, provider: &str, model: &str) -> BridgeError {
        BridgeError::ProviderQuotaExceeded {
            provider: provider.to_string(),
            model: model.to_string(),
            fallback_model: self.fallback_model.clone(),
            fallback_attempted: self.attempted,
        }
    }

    /// Text from a replayed chunk that may be relayed: assistant prose only,
    /// never code, console output or payload noise.
    pub fn relay_text(chunk: RawChunk) -> Option<String> {
        match StreamChunk::decode(chunk)? {
            StreamChunk::TextDelta { text } if !is_noisy_execution_text(&text) => Some(text),
            _ => None,
        }
    }
}
