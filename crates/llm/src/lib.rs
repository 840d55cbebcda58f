//! Interpreter Bridge LLM
//!
//! The seam between the controller and the conversational code-execution
//! engine that drives the model:
//! - `ExecutionEngine` - blocking chunk stream plus mutable model/system prompt
//! - `DisplaySink` - injected receiver for the engine's side-channel display text
//! - `ScopedModel` / `ScopedSystemPrompt` - overrides restored on drop
//! - `quota` - provider quota/rate-limit classification
//!
//! Provider clients are not part of this crate; engines bring their own.

pub mod engine;
pub mod error;
pub mod quota;

pub use engine::{ChunkStream, DisplaySink, ExecutionEngine, NullDisplay, ScopedModel, ScopedSystemPrompt};
pub use error::{EngineError, EngineResult};
pub use quota::{is_google_quota_signal, is_quota_or_rate_limit_message, QuotaSignal};
