//! Engine error types

use thiserror::Error;

use crate::quota::is_quota_or_rate_limit_message;

/// Failure reported by an execution engine, either from `chat()` itself or
/// yielded mid-stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("Engine unavailable: {message}")]
    Unavailable { message: String },
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Raw message text as the engine reported it.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Provider { message }
            | EngineError::RateLimited { message }
            | EngineError::Stream { message }
            | EngineError::Unavailable { message } => message,
        }
    }

    /// Returns true when this error means the provider is throttling or out of quota.
    pub fn is_quota_or_rate_limit(&self) -> bool {
        matches!(self, EngineError::RateLimited { .. })
            || is_quota_or_rate_limit_message(self.message())
    }
}
