//! Interpreter Bridge Tools
//!
//! Text classification and command execution for the controller. Everything
//! here except the runner is pure and synchronous:
//! - `noise` - signatures of execute-payload shreds that must not reach users
//! - `payload` - `PayloadExtractor` and the three-pass payload parser
//! - `salvage` - regex recovery of known-safe command shapes
//! - `fingerprint` - command fingerprints and `FingerprintGuard`
//! - `capability` - `CapabilityRegistry` allowlist over fingerprints
//! - `summary` - console output classification and result summaries
//! - `runner` - `CommandRunner` trait and the shell runner

pub mod capability;
pub mod command;
pub mod fingerprint;
pub mod noise;
mod pattern;
pub mod payload;
pub mod runner;
pub mod salvage;
pub mod summary;

// Re-export core types
pub use capability::{CapabilityRegistry, CapabilityRule};
pub use command::{CommandSource, ExecutionIntent, RawPayload, ScriptLanguage, StructuredCommand};
pub use fingerprint::{fingerprint, FingerprintGuard, Fingerprints};
pub use noise::{is_noisy_execution_text, sanitize_error_text};
pub use payload::{extract_execute_payload, Extraction, FinishOutcome, PayloadExtractor};
pub use runner::{CommandRunner, ShellCommandRunner};
pub use summary::{looks_like_error_output, looks_like_process_snapshot, summarize};
