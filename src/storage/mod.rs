//! Storage Layer
//!
//! JSON file persistence for controller settings.

pub mod config;

pub use config::SettingsStore;
