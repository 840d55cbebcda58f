//! Interpreter Bridge - Streaming Tool-Execution Controller
//!
//! Wraps a conversational code-execution engine and turns its blocking chunk
//! stream into an ordered stream of `OutputEvent`s for one request at a time.
//! Between the engine and the caller it:
//! - recognizes model-emitted execute payloads and runs them through an
//!   allowlisted command runner
//! - stops runaway or repetitive execution
//! - suppresses payload noise so raw tool-call JSON never reaches the user
//! - retries once on a fallback model when the provider runs out of quota
//!
//! ## Crates
//!
//! - `interpreter-bridge-core` - requests, chunks, events, error taxonomy
//! - `interpreter-bridge-llm` - the `ExecutionEngine` seam and quota detection
//! - `interpreter-bridge-tools` - fingerprints, payload extraction, runners
//!
//! This crate holds the controller itself, its settings and their storage.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Controller
pub use services::controller::{EventStream, InterpreterController, BACKEND_STATUS};
pub use services::admission::WAITING_STATUS;

// Configuration
pub use models::settings::ControllerSettings;
pub use storage::config::SettingsStore;
pub use utils::error::{AppError, AppResult};

// Workspace types callers need to drive the controller
pub use interpreter_bridge_core::{
    BridgeError, ChunkRecord, ExecutionRequest, HistoryEntry, Locale, OutputEvent, RawChunk,
};
pub use interpreter_bridge_llm::{DisplaySink, EngineError, ExecutionEngine};
pub use interpreter_bridge_tools::{CapabilityRegistry, CapabilityRule, CommandRunner, ShellCommandRunner};
