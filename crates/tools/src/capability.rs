//! Capability Registry
//!
//! The set of command fingerprints a structured PowerShell payload may
//! contain. Built once and injected into the controller; never mutated while
//! requests are running.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprints;

/// One allowlist rule over fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum CapabilityRule {
    /// Fingerprint starts with the value
    Prefix(String),
    /// Fingerprint equals the value
    Exact(String),
}

impl CapabilityRule {
    pub fn allows(&self, fingerprint: &str) -> bool {
        match self {
            CapabilityRule::Prefix(prefix) => fingerprint.starts_with(prefix.as_str()),
            CapabilityRule::Exact(value) => fingerprint == value,
        }
    }
}

/// Allowlist of command shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRegistry {
    rules: Vec<CapabilityRule>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::windows_defaults()
    }
}

impl CapabilityRegistry {
    pub fn new(rules: Vec<CapabilityRule>) -> Self {
        Self { rules }
    }

    /// Launch apps, read the process table, open Explorer.
    pub fn windows_defaults() -> Self {
        Self::new(vec![
            CapabilityRule::Prefix("start-process:".to_string()),
            CapabilityRule::Prefix("get-process".to_string()),
            CapabilityRule::Exact("tasklist".to_string()),
            CapabilityRule::Exact("explorer".to_string()),
        ])
    }

    pub fn with_rule(mut self, rule: CapabilityRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[CapabilityRule] {
        &self.rules
    }

    pub fn allows(&self, fingerprint: &str) -> bool {
        self.rules.iter().any(|rule| rule.allows(fingerprint))
    }

    /// Check a whole command. An empty set is never allowed; otherwise the
    /// error lists the fingerprints no rule covers.
    pub fn check(&self, fingerprints: &Fingerprints) -> Result<(), Vec<String>> {
        if fingerprints.is_empty() {
            return Err(Vec::new());
        }
        let denied: Vec<String> = fingerprints
            .iter()
            .filter(|fp| !self.allows(fp))
            .cloned()
            .collect();
        if denied.is_empty() {
            Ok(())
        } else {
            Err(denied)
        }
    }
}
