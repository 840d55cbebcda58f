//! Command Runners
//!
//! Synchronous execution of one structured command. Runners are called from
//! the blocking session worker and always return text: failures surface as
//! `Error: ...` lines or stderr, never as a Rust error.
//!
//! `ShellCommandRunner` drives `tokio::process` on the ambient runtime handle
//! with a fixed per-command timeout. Cancellation is not wired in here; the
//! timeout is the only bound on a running command.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::command::ScriptLanguage;
use crate::pattern::{first_group, lazy_regex, start_process_target};
use crate::summary::NO_OUTPUT;

/// Default timeout for one command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(25);

/// Maximum length of a desktop Python snippet
pub const MAX_PYTHON_SNIPPET_CHARS: usize = 5_000;

const BLOCKED_PYTHON_PATTERNS: &[&str] = &[
    "import os",
    "import subprocess",
    "import socket",
    "from os",
    "from subprocess",
    "from socket",
    "__import__",
    "eval(",
    "exec(",
    "open(",
    "pathlib",
    "shutil",
    "requests",
    "while true",
];

lazy_regex!(user_profile_path, r"(?i)^[a-zA-Z]:\\Users\\[^\\]+\\(.+)$");

/// Executes one command and returns its combined output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, language: ScriptLanguage, code: &str) -> String;
}

/// Check a desktop Python snippet: only `import pyautogui`/`import time`,
/// `pyautogui.*` calls and `time.sleep(...)` are accepted.
pub fn validate_python_snippet(code: &str) -> Result<(), String> {
    if code.trim().is_empty() || code.chars().count() > MAX_PYTHON_SNIPPET_CHARS {
        return Err("Error: Python snippet is empty or too large.".to_string());
    }
    let lowered = code.to_lowercase();
    if BLOCKED_PYTHON_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Err("Error: Unsupported Python snippet for desktop execution.".to_string());
    }

    for line in code.replace('\r', "\n").lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_lowercase();
        if lower.starts_with('#') {
            continue;
        }
        if lower.starts_with("import ") {
            let modules: Vec<String> = line[7..]
                .split(',')
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect();
            if modules.is_empty() || modules.iter().any(|m| m != "pyautogui" && m != "time") {
                return Err("Error: Only 'import pyautogui' and 'import time' are allowed.".to_string());
            }
            continue;
        }
        if lower.starts_with("from ") {
            return Err("Error: 'from ... import ...' is not allowed in desktop snippets.".to_string());
        }
        if !(lower.starts_with("pyautogui.") || lower.starts_with("time.sleep(")) {
            return Err("Error: Only pyautogui.* and time.sleep() commands are allowed.".to_string());
        }
    }
    Ok(())
}

fn file_name(path: &str) -> &str {
    path.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(path)
}

/// Candidate replacements for a launch target that does not exist.
fn launch_candidates(target: &str, home: Option<&Path>, local_app_data: Option<&Path>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    // A model-invented user name under C:\Users\<name>\ is rewritten to the real home.
    if let (Some(caps), Some(home)) = (
        user_profile_path().and_then(|re| re.captures(target)),
        home,
    ) {
        let suffix = caps.get(1).map_or("", |m| m.as_str());
        let home_text = home.to_string_lossy();
        let drive = match home_text.get(..2) {
            Some(d) if d.ends_with(':') => d.to_string(),
            _ => "C:".to_string(),
        };
        let user = home
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !user.is_empty() {
            candidates.push(format!("{}\\Users\\{}\\{}", drive, user, suffix));
        }
    }

    let base_name = file_name(target);
    if let Some(local) = local_app_data.filter(|_| !base_name.is_empty()) {
        candidates.push(local.join(base_name).to_string_lossy().into_owned());
        let stem = base_name.rsplit_once('.').map_or(base_name, |(stem, _)| stem);
        if !stem.is_empty() {
            candidates.push(local.join(stem).join(base_name).to_string_lossy().into_owned());
        }
    }

    let mut deduped: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !deduped.contains(&candidate) {
            deduped.push(candidate);
        }
    }
    deduped
}

/// Repair a `Start-Process` target that does not exist, using explicit
/// home and local-app-data roots. Returns the possibly rewritten code and a
/// note describing the repair.
pub fn repair_start_process_with(
    code: &str,
    home: Option<&Path>,
    local_app_data: Option<&Path>,
) -> (String, Option<String>) {
    let Some(caps) = start_process_target().and_then(|re| re.captures(code)) else {
        return (code.to_string(), None);
    };
    let Some(whole) = caps.get(0) else {
        return (code.to_string(), None);
    };
    let target = first_group(&caps);
    let target = target.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
    if target.is_empty() || Path::new(target).exists() {
        return (code.to_string(), None);
    }

    for candidate in launch_candidates(target, home, local_app_data) {
        if Path::new(&candidate).exists() {
            let fixed = format!(
                "{}Start-Process -FilePath \"{}\"{}",
                &code[..whole.start()],
                candidate,
                &code[whole.end()..]
            );
            tracing::info!(from = %target, to = %candidate, "Repaired launch path");
            return (fixed, Some(format!("Adjusted launch path to existing file: {}", candidate)));
        }
    }
    (code.to_string(), None)
}

/// Repair a `Start-Process` target against this machine's directories.
pub fn repair_start_process(code: &str) -> (String, Option<String>) {
    let home = dirs::home_dir();
    let local = dirs::data_local_dir();
    repair_start_process_with(code, home.as_deref(), local.as_deref())
}

/// Join stdout and stderr the way the summaries expect them.
fn combine_output(stdout: &str, stderr: &str, note: Option<&str>) -> String {
    let body = match (stdout.trim(), stderr.trim()) {
        ("", "") => None,
        (out, "") => Some(out.to_string()),
        ("", err) => Some(err.to_string()),
        (out, err) => Some(format!("{}\n{}", out, err)),
    };
    match (note, body) {
        (Some(note), Some(body)) => format!("{}\n{}", note, body),
        (Some(note), None) => note.to_string(),
        (None, Some(body)) => body,
        (None, None) => NO_OUTPUT.to_string(),
    }
}

/// Runs PowerShell and desktop Python through the local shell.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    timeout: Duration,
    powershell: PathBuf,
    python: PathBuf,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ShellCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            powershell: PathBuf::from("powershell"),
            python: PathBuf::from("python"),
        }
    }

    pub fn with_interpreters(mut self, powershell: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        self.powershell = powershell.into();
        self.python = python.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn execute(&self, program: &Path, args: &[&str], note: Option<&str>) -> String {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return format!("Error: no async runtime available to run commands: {}", e),
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.timeout;
        let result = handle.block_on(async move {
            tokio::select! {
                output = cmd.output() => Some(output),
                _ = tokio::time::sleep(timeout) => None,
            }
        });

        match result {
            Some(Ok(output)) => combine_output(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
                note,
            ),
            Some(Err(e)) => {
                tracing::warn!(program = %program.display(), error = %e, "Failed to spawn command");
                format!("Error: failed to start {}: {}", program.display(), e)
            }
            None => {
                tracing::warn!(program = %program.display(), timeout_ms = timeout.as_millis() as u64, "Command timed out");
                format!("Error: command timed out after {} ms", timeout.as_millis())
            }
        }
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run(&self, language: ScriptLanguage, code: &str) -> String {
        match language {
            ScriptLanguage::PowerShell => {
                let (code, note) = repair_start_process(code);
                self.execute(&self.powershell, &["-NoProfile", "-Command", &code], note.as_deref())
            }
            ScriptLanguage::Python => {
                if let Err(message) = validate_python_snippet(code) {
                    return message;
                }
                let script = format!("import pyautogui\npyautogui.FAILSAFE = False\n{}", code);
                self.execute(&self.python, &["-c", &script], None)
            }
        }
    }
}
