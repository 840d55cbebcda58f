//! Bridge Error Types
//!
//! Every failure the controller can hit while serving one request. None of
//! these ever propagate to the caller as a Rust error: the worker converts
//! each one into a single `OutputEvent::Error` carrying `user_message()`.
//!
//! `Display` is the developer-facing form used in logs. `user_message()` is
//! the short, pre-localized text shown to the user.

use thiserror::Error;

use crate::locale::Locale;

/// Controller error taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Admission wait exceeded the hard cap
    #[error("Queue timeout: waited {waited_ms}ms for the backend slot")]
    QueueTimeout { waited_ms: u64 },

    /// Structured command has a fingerprint outside the capability allowlist
    #[error("Unsafe command: {fingerprints:?} not in allowlist")]
    UnsafeCommand { fingerprints: Vec<String> },

    /// A fingerprint exceeded the per-request repeat limit
    #[error("Repeated command: `{fingerprint}` exceeded the repeat limit")]
    RepeatedCommand { fingerprint: String },

    /// A second structured command arrived after one already ran
    #[error("Repeated structured payload")]
    RepeatedPayload,

    /// Structured payload in a language the controller cannot run
    #[error("Unsupported payload language: {language}")]
    UnsupportedLanguage { language: String },

    /// More code blocks than allowed for one request
    #[error("Too many code blocks (limit {limit})")]
    TooManyCodeBlocks { limit: usize },

    /// More markdown fences than allowed for one request
    #[error("Too many markdown fences (limit {limit})")]
    TooManyFences { limit: usize },

    /// Console output kept failing past the retry budget
    #[error("Execution failed {failures} times")]
    ExecutionFailed { failures: usize },

    /// Provider quota or rate limit exhausted
    #[error("Provider quota exceeded: provider={provider} model={model} fallback_attempted={fallback_attempted}")]
    ProviderQuotaExceeded {
        provider: String,
        model: String,
        fallback_model: String,
        fallback_attempted: bool,
    },

    /// Any other engine failure, already sanitized
    #[error("Agent error: {message}")]
    Agent { message: String },
}

/// Result type alias for bridge errors
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Create a repeated command error
    pub fn repeated(fingerprint: impl Into<String>) -> Self {
        Self::RepeatedCommand {
            fingerprint: fingerprint.into(),
        }
    }

    /// Create an agent error from already-sanitized text
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent {
            message: message.into(),
        }
    }

    /// Stable kind label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::QueueTimeout { .. } => "queue_timeout",
            BridgeError::UnsafeCommand { .. } => "unsafe_command",
            BridgeError::RepeatedCommand { .. } | BridgeError::RepeatedPayload => {
                "repeated_command"
            }
            BridgeError::UnsupportedLanguage { .. } => "unsupported_language",
            BridgeError::TooManyCodeBlocks { .. } | BridgeError::TooManyFences { .. } => {
                "too_many_code_blocks"
            }
            BridgeError::ExecutionFailed { .. } => "execution_error",
            BridgeError::ProviderQuotaExceeded { .. } => "provider_quota_exceeded",
            BridgeError::Agent { .. } => "unknown_agent_error",
        }
    }

    /// Short, pre-localized text for the user.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            BridgeError::QueueTimeout { .. } => locale
                .pick(
                    "Agent backend is busy for too long. Please retry shortly.",
                    "الباكند مشغول لفترة طويلة. حاول مرة ثانية بعد قليل.",
                )
                .to_string(),
            BridgeError::UnsafeCommand { .. } => locale
                .pick(
                    "Stopped structured execute payload: command not in safe allowlist.",
                    "تم إيقاف الطلب: الأمر غير مسموح ضمن قائمة الأمان.",
                )
                .to_string(),
            BridgeError::RepeatedCommand { fingerprint } => match locale {
                Locale::English => format!(
                    "Stopped repeated execution: duplicate command pattern detected (`{}`).",
                    fingerprint
                ),
                Locale::Arabic => "تم إيقاف التنفيذ: تم اكتشاف تكرار نفس الأمر.".to_string(),
            },
            BridgeError::RepeatedPayload => locale
                .pick(
                    "Stopped: structured execute payload was repeated.",
                    "تم إيقاف الطلب: تم تكرار تنفيذ نفس الأمر.",
                )
                .to_string(),
            BridgeError::UnsupportedLanguage { language } => match locale {
                Locale::English => format!(
                    "Stopped structured execute payload: unsupported language '{}'.",
                    language
                ),
                Locale::Arabic => "تم إيقاف الطلب: لغة التنفيذ غير مدعومة في هذا الوضع.".to_string(),
            },
            BridgeError::TooManyCodeBlocks { limit } => match locale {
                Locale::English => format!(
                    "Stopped execution after reaching the limit of {} code blocks for this message.",
                    limit
                ),
                Locale::Arabic => format!(
                    "تم إيقاف التنفيذ بعد الوصول إلى الحد الأقصى ({}) لكتل الكود في هذه الرسالة.",
                    limit
                ),
            },
            BridgeError::TooManyFences { .. } => locale
                .pick(
                    "Stopped noisy output: too many markdown code fences were emitted.",
                    "تم إيقاف المخرجات المزعجة: تم اكتشاف عدد كبير من كتل الكود.",
                )
                .to_string(),
            BridgeError::ExecutionFailed { .. } => locale
                .pick(
                    "Stopped after repeated execution errors (retry limit reached).",
                    "تم إيقاف التنفيذ بعد تكرار أخطاء التنفيذ (تم بلوغ حد إعادة المحاولة).",
                )
                .to_string(),
            BridgeError::ProviderQuotaExceeded {
                provider,
                model,
                fallback_model,
                fallback_attempted,
            } => quota_message(provider, model, fallback_model, *fallback_attempted, locale),
            BridgeError::Agent { message } => match locale {
                Locale::English => format!("Agent error: {}", message),
                Locale::Arabic => format!("خطأ في الوكيل: {}", message),
            },
        }
    }
}

fn quota_message(
    provider: &str,
    model: &str,
    fallback_model: &str,
    fallback_attempted: bool,
    locale: Locale,
) -> String {
    if provider.eq_ignore_ascii_case("gemini") {
        return match (locale, fallback_attempted) {
            (Locale::Arabic, true) => format!(
                "❌ تم استهلاك حصة Gemini أو تم تجاوز حد المعدل.\n\n\
                 حاولت إعادة الطلب تلقائياً باستخدام `{}` ولم تنجح.\n\
                 تحقق من حصة Google AI Studio/API Key ثم أعد المحاولة لاحقاً.",
                fallback_model
            ),
            (Locale::Arabic, false) => format!(
                "❌ تم الوصول إلى حد Gemini (quota/rate limit).\n\n\
                 النموذج الحالي: `{}`\n\
                 تحقق من حصة Google AI Studio أو جرّب لاحقاً.",
                model
            ),
            (Locale::English, true) => format!(
                "❌ Gemini quota/rate limit reached.\n\n\
                 Automatic fallback to `{}` was attempted and also failed.\n\
                 Check your Google AI Studio quota/API key and retry later.",
                fallback_model
            ),
            (Locale::English, false) => format!(
                "❌ Gemini quota/rate limit reached.\n\n\
                 Current model: `{}`\n\
                 Check your Google AI Studio quota/API key and retry later.",
                model
            ),
        };
    }

    locale
        .pick(
            "❌ Provider quota/rate limit reached.\n\nPlease check your account limits and retry.",
            "❌ تم الوصول إلى حد المزود (quota/rate limit).\n\nيرجى التحقق من حدود الحساب ثم إعادة المحاولة.",
        )
        .to_string()
}
