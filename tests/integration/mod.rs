//! Integration Tests Module
//!
//! End-to-end tests for the interpreter bridge controller. Every test drives
//! `InterpreterController` with a scripted engine and a recording runner, so
//! no model or shell is involved.

// Scripted engine, recording runner, stream helpers
mod support;

// Forwarding, structured execution, runaway guards, auto-stop, cancellation
mod controller_test;

// Quota fallback replay and model restoration
mod fallback_test;

// Single-flight admission, queue heartbeats and wait cap
mod admission_test;

// Backend heartbeats, dropped callers and worker failures
mod bridge_test;
