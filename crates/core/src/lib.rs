//! Interpreter Bridge Core
//!
//! Foundational types for the Interpreter Bridge workspace. This crate has
//! zero dependencies on the engine seam, command runners, or the controller.
//!
//! ## Module Organization
//!
//! - `error` - Controller error taxonomy (`BridgeError`, `BridgeResult`)
//! - `locale` - User-facing language selection (`Locale`)
//! - `request` - Immutable per-call input (`ExecutionRequest`, `HistoryEntry`)
//! - `streaming` - Raw engine chunks, decoded `StreamChunk`, caller-facing `OutputEvent`
//! - `text` - Char-boundary safe bounding helpers
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/thiserror** - keeps build times minimal
//! 2. **Decode at the boundary** - loosely-typed engine chunks become a closed enum here
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod locale;
pub mod request;
pub mod streaming;
pub mod text;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{BridgeError, BridgeResult};

// ── Locale ─────────────────────────────────────────────────────────────
pub use locale::Locale;

// ── Request Types ──────────────────────────────────────────────────────
pub use request::{ExecutionRequest, HistoryEntry};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::{ChunkRecord, ConsolePhase, OutputEvent, RawChunk, StreamChunk};
