//! Execution Engine Trait
//!
//! Defines the interface the controller drives. An engine runs a blocking
//! conversational loop: `chat()` returns an iterator that yields one chunk at
//! a time while the engine talks to its model and executes code on its own.
//! The iterator is consumed on a dedicated blocking worker, never on the
//! async runtime.
//!
//! The engine owns two mutable fields, the system prompt and the model id.
//! The controller only changes them through `ScopedSystemPrompt` and
//! `ScopedModel`, which put the previous value back on drop.

use std::sync::Arc;

use interpreter_bridge_core::streaming::RawChunk;

use crate::error::EngineError;

/// Blocking chunk iterator returned by `ExecutionEngine::chat`.
pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<RawChunk, EngineError>> + 'a>;

/// Receiver for text the engine displays outside the chunk stream
/// (status banners, markdown notices, provider error blurbs).
pub trait DisplaySink: Send + Sync {
    fn display(&self, text: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn display(&self, _text: &str) {}
}

/// A conversational code-execution engine.
///
/// Implementations use interior mutability: one engine instance is shared
/// by the controller and `stop()` may call `reset()` from another thread
/// while a stream is being consumed.
pub trait ExecutionEngine: Send + Sync {
    /// Start a streamed chat turn. `display` receives side-channel text for
    /// the duration of this call only.
    fn chat<'a>(
        &'a self,
        message: &str,
        display: Arc<dyn DisplaySink>,
    ) -> Result<ChunkStream<'a>, EngineError>;

    /// Current system prompt.
    fn system_prompt(&self) -> String;

    /// Replace the system prompt.
    fn set_system_prompt(&self, prompt: String);

    /// Current model identifier.
    fn model(&self) -> String;

    /// Replace the model identifier.
    fn set_model(&self, model: String);

    /// Best-effort abort of the current turn and conversation state.
    fn reset(&self);
}

/// Temporary model override, restored on drop.
pub struct ScopedModel<'a> {
    engine: &'a dyn ExecutionEngine,
    original: String,
}

impl<'a> ScopedModel<'a> {
    pub fn swap(engine: &'a dyn ExecutionEngine, model: impl Into<String>) -> Self {
        let original = engine.model();
        engine.set_model(model.into());
        Self { engine, original }
    }

    /// Model that was active before the swap.
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl Drop for ScopedModel<'_> {
    fn drop(&mut self) {
        tracing::debug!(model = %self.original, "Restoring engine model");
        self.engine.set_model(std::mem::take(&mut self.original));
    }
}

/// Temporary system prompt prefix, restored on drop.
pub struct ScopedSystemPrompt<'a> {
    engine: &'a dyn ExecutionEngine,
    original: String,
}

impl<'a> ScopedSystemPrompt<'a> {
    /// Put `prefix` in front of the engine's existing system prompt.
    pub fn prepend(engine: &'a dyn ExecutionEngine, prefix: &str) -> Self {
        let original = engine.system_prompt();
        engine.set_system_prompt(format!("{}\n\n{}", prefix, original));
        Self { engine, original }
    }
}

impl Drop for ScopedSystemPrompt<'_> {
    fn drop(&mut self) {
        self.engine
            .set_system_prompt(std::mem::take(&mut self.original));
    }
}
