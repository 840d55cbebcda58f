//! Command fingerprints and the repeat guard
//!
//! A fingerprint is the normalized shape of one command line:
//! `start-process:taskmgr.exe`, `get-process`, `get-process:workingset`,
//! `tasklist`, `explorer`, or the first two tokens of any other
//! command-looking line. Equivalent commands collide on purpose so an agent
//! stuck reissuing the same action is caught even when it rephrases it.

use std::collections::{BTreeSet, HashMap};

use crate::pattern::{first_group, start_process_target};

/// Set of fingerprints for one command, ordered for deterministic checks.
pub type Fingerprints = BTreeSet<String>;

const FALLBACK_CHARS: usize = 200;

const WRAPPER_LINES: &[&str] = &["try", "try {", "catch", "catch {", "}", "{", "} catch {"];

const SKIPPED_PREFIXES: &[&str] = &["#", "write-output", "write-error", "$"];

const COMMAND_PREFIXES: &[&str] = &[
    "start-process",
    "get-process",
    "tasklist",
    "explorer",
    "python ",
    "py ",
    "import ",
    "powershell",
    "pwsh",
    "cmd ",
    "try ",
    "select-object",
];

/// Lowercase, drop backticks, collapse whitespace.
pub fn normalize_command(command: &str) -> String {
    interpreter_bridge_core::text::collapse_whitespace(&command.replace('`', "")).to_lowercase()
}

/// Fingerprint every command-looking line. With `allow_fallback`, a command
/// with no recognizable line is keyed by its first 200 normalized chars.
pub fn fingerprint(command: &str, allow_fallback: bool) -> Fingerprints {
    let mut fingerprints = Fingerprints::new();
    let command = command.replace("```powershell", "").replace("```", "");

    for raw_line in command.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let lowered = line.to_lowercase();
        if SKIPPED_PREFIXES.iter().any(|p| lowered.starts_with(p))
            || WRAPPER_LINES.contains(&lowered.as_str())
        {
            continue;
        }

        let raw_lowered = lowered.replace('`', "");
        let unquoted = raw_lowered.replace(['"', '\''], "");
        let normalized = interpreter_bridge_core::text::collapse_whitespace(&unquoted);
        if normalized.is_empty() {
            continue;
        }

        let looks_like_command =
            normalized.contains('|') || COMMAND_PREFIXES.iter().any(|p| normalized.starts_with(p));
        if !looks_like_command {
            continue;
        }

        if let Some(caps) = start_process_target().and_then(|re| re.captures(&raw_lowered)) {
            let mut target = first_group(&caps)
                .trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .to_string();
            if target.starts_with("task") {
                target = "taskmgr.exe".to_string();
            }
            fingerprints.insert(format!("start-process:{}", target));
            continue;
        }

        let key = if normalized.starts_with("get-process") {
            if normalized.contains("workingset") {
                "get-process:workingset".to_string()
            } else {
                "get-process".to_string()
            }
        } else if normalized.starts_with("tasklist") {
            "tasklist".to_string()
        } else if normalized.starts_with("explorer") {
            "explorer".to_string()
        } else {
            normalized
                .split_whitespace()
                .take(2)
                .collect::<Vec<_>>()
                .join(" ")
        };
        fingerprints.insert(key);
    }

    if allow_fallback && fingerprints.is_empty() {
        let normalized = normalize_command(&command);
        if !normalized.is_empty() {
            fingerprints.insert(
                interpreter_bridge_core::text::truncate_chars(&normalized, FALLBACK_CHARS)
                    .to_string(),
            );
        }
    }

    fingerprints
}

/// Per-request repetition counter.
#[derive(Debug, Clone)]
pub struct FingerprintGuard {
    repeat_limit: usize,
    counts: HashMap<String, usize>,
    last: Fingerprints,
}

impl FingerprintGuard {
    pub fn new(repeat_limit: usize) -> Self {
        Self {
            repeat_limit: repeat_limit.max(1),
            counts: HashMap::new(),
            last: Fingerprints::new(),
        }
    }

    /// Count one more occurrence of each fingerprint. Returns the first one
    /// that exceeds the repeat limit; counting stops there.
    pub fn track(&mut self, fingerprints: &Fingerprints) -> Option<String> {
        for fp in fingerprints {
            let count = self.counts.entry(fp.clone()).or_insert(0);
            *count += 1;
            if *count > self.repeat_limit {
                tracing::warn!(fingerprint = %fp, count = *count, "Repeated command detected");
                return Some(fp.clone());
            }
        }
        None
    }

    /// Fingerprints of the most recently executed command.
    pub fn last(&self) -> &Fingerprints {
        &self.last
    }

    pub fn set_last(&mut self, fingerprints: Fingerprints) {
        self.last = fingerprints;
    }

    pub fn count(&self, fingerprint: &str) -> usize {
        self.counts.get(fingerprint).copied().unwrap_or(0)
    }
}
