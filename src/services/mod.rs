//! Services
//!
//! Controller logic. `controller` is the public entry point; the other
//! modules are the per-request pieces it is assembled from.

pub mod admission;
pub mod completion;
pub mod controller;
pub mod fallback;
pub mod prompt;

pub use admission::{AdmissionError, AdmissionGate, AdmissionPermit, WAITING_STATUS};
pub use completion::{CompletionDetector, CompletionVerdict};
pub use controller::{EventStream, InterpreterController, BACKEND_STATUS};
pub use fallback::FallbackCoordinator;
pub use prompt::{compose_message, effective_system_prompt, history_preamble, EXECUTION_GUARDRAILS};
