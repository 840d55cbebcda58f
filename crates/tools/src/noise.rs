//! Execute-payload noise signatures
//!
//! Models that emit tool calls as text stream them in shreds: `{"name`,
//! `": "powershell",`, `"code": "Start-Process ...`, `"}}`. None of that may
//! reach the user. These predicates decide, chunk by chunk, whether text is
//! such a shred. They are empirical and deliberately overlapping; each one is
//! used at a different point of the extraction flow.

use crate::pattern::{is_match, lazy_regex};

/// Command words that mark a chunk as part of an execute payload.
const COMMAND_MARKERS: &[&str] = &[
    "start-process",
    "get-process",
    "stop-process",
    "set-volume",
    "set-volumelevel",
    "set-culture",
    "set-win",
    "set-bluetoothstate",
    "shell:appsfolder",
    "write-output",
];

/// Markers used by `is_execute_fragment` (requires `{`, `}` or `:` too).
const FRAGMENT_MARKERS: &[&str] = &[
    "execute",
    "\"arguments\"",
    "\"language\"",
    "\"code\"",
    "powershell",
    "powers ",
    "python",
    "pyautogui",
];

/// Markers used by the JSON-ish noise checks.
const PAYLOAD_MARKERS: &[&str] = &[
    "execute",
    "arguments",
    "language",
    "code",
    "explorer.exe",
    "pyautogui",
    "powershell",
    "powers ",
    "python",
];

/// Markers that keep an already-open capture going.
const CONTINUATION_MARKERS: &[&str] = &[
    ":\\",
    ".exe",
    "ms-settings:",
    "telegram:",
    "https://",
    "http://",
    "powers ",
    "python",
    "pyautogui",
    "tasklist",
    "explorer.exe",
    "\"language\"",
    "\"code\"",
    "\"arguments\"",
    "\"name\"",
    "{",
    "}",
    "[",
    "]",
];

const BROKEN_KEYS: &[&str] = &["namepowers", "argumentspowers", "namepython", "argumentspython"];

lazy_regex!(language_value, r#"^\s*"?\s*:\s*"(powershell|python|pwsh)""#);
lazy_regex!(key_colon, r#"^\s*"?\s*(name|arguments|language|code)\s*"?\s*:"#);
lazy_regex!(key_comma, r#"^\s*"?\s*(name|arguments|language|code)\s*"?\s*,\s*"\s*:\s*"#);
lazy_regex!(truncated_powershell, r"^\s*(?:powers|powershell)\b");
lazy_regex!(name_pyautogui, r"^\s*name\s+pyautogui");

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn has_payload_key_shape(lowered: &str) -> bool {
    is_match(language_value(), lowered) || is_match(key_comma(), lowered)
}

/// Leaked or fragmented command text that must never be user-facing.
pub fn looks_like_raw_command_leak(text: &str) -> bool {
    let compact = text.trim().trim_matches('`');
    if compact.is_empty() {
        return false;
    }
    let lowered = compact.to_lowercase();

    let has_command = contains_any(&lowered, COMMAND_MARKERS)
        || contains_any(&lowered, &["pyautogui", "-volume"]);
    if has_command
        && (lowered.contains("{\"name\"")
            || lowered.contains("\"arguments\"")
            || lowered.contains("\"language\"")
            || lowered.contains("\"code\"")
            || lowered.ends_with("\"}}")
            || lowered.ends_with("'}"))
    {
        return true;
    }

    // Truncated "powershell" shreds such as `powers -Volume 100"}}`.
    if is_match(truncated_powershell(), &lowered)
        && contains_any(&lowered, &["-volume", "start-process", "get-process", "set-", "pyautogui"])
    {
        return true;
    }

    // Raw python snippets streamed as prose; `\n` here is the escaped two-char form.
    if (lowered.starts_with("import pyautogui") || lowered.starts_with("\\nimport pyautogui"))
        && (compact.contains("\\n") || lowered.contains("pyautogui."))
    {
        return true;
    }
    if lowered.contains("pyautogui.screenshot") && lowered.contains("screenshot.save") {
        return true;
    }
    is_match(name_pyautogui(), &lowered) && lowered.contains("screenshot")
}

/// Partial JSON likely belonging to an execute payload.
pub fn is_execute_fragment(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if looks_like_raw_command_leak(text) {
        return true;
    }
    let lowered = text.to_lowercase();
    let has_marker =
        contains_any(&lowered, FRAGMENT_MARKERS) || contains_any(&lowered, COMMAND_MARKERS);
    if has_marker && text.contains(['{', '}', ':']) {
        return true;
    }
    if has_payload_key_shape(&lowered) || is_match(key_colon(), &lowered) {
        return true;
    }
    lowered.contains("\"language\"") && lowered.contains("\"code\"")
}

/// Malformed JSON-like execute text.
pub fn looks_like_execute_noise(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if looks_like_raw_command_leak(text) {
        return true;
    }
    let lowered = text.to_lowercase();
    let lowered = lowered.trim().trim_matches('`');
    if lowered.is_empty() {
        return false;
    }

    let looks_jsonish = lowered.starts_with('{')
        || lowered.starts_with('[')
        || lowered.contains("\"arguments")
        || is_match(key_colon(), lowered);
    if looks_jsonish
        && (contains_any(lowered, PAYLOAD_MARKERS) || contains_any(lowered, COMMAND_MARKERS))
    {
        return true;
    }
    if has_payload_key_shape(lowered) {
        return true;
    }
    lowered.contains("\"language\"") && lowered.contains("\"code\"")
}

/// Partial execute payload, including broken and very short chunks.
pub fn looks_like_payload_fragment(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if looks_like_raw_command_leak(text) {
        return true;
    }
    let stripped = text.trim();
    if stripped.is_empty() {
        return false;
    }
    let compact = stripped.trim_matches('`').trim();
    let lowered = compact.to_lowercase();

    if is_execute_fragment(compact) {
        return true;
    }
    if matches!(compact, "{" | "}" | "[" | "]") {
        return true;
    }

    let has_marker =
        contains_any(&lowered, PAYLOAD_MARKERS) || contains_any(&lowered, COMMAND_MARKERS);
    if compact.starts_with('{') && has_marker {
        return true;
    }
    if contains_any(&lowered, BROKEN_KEYS) && has_marker {
        return true;
    }
    // Short JSON-ish prefixes tend to precede malformed payloads.
    if compact.starts_with('{') && compact.chars().count() <= 24 {
        return true;
    }
    if is_match(key_colon(), &lowered) || has_payload_key_shape(&lowered) {
        return true;
    }
    (lowered.contains("\"language\"") && lowered.contains("\"code\""))
        || (lowered.contains("language") && lowered.contains("code") && has_marker)
}

/// Chunk that plausibly continues a capture that is already open.
pub fn looks_like_execute_continuation(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if looks_like_raw_command_leak(text) {
        return true;
    }
    let lowered = text.to_lowercase();
    contains_any(&lowered, CONTINUATION_MARKERS)
        || contains_any(&lowered, COMMAND_MARKERS)
        || is_match(key_colon(), &lowered)
        || has_payload_key_shape(&lowered)
}

/// True when text should be hidden from user output.
pub fn is_noisy_execution_text(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    looks_like_execute_noise(text)
        || looks_like_payload_fragment(text)
        || looks_like_raw_command_leak(text)
}

/// Reduce raw engine error text to one short line safe to show a user.
pub fn sanitize_error_text(text: &str) -> String {
    const MAX_CHARS: usize = 300;
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.to_lowercase().starts_with("traceback"))
        .unwrap_or("");
    if line.is_empty() || is_noisy_execution_text(line) {
        return "execution engine failed".to_string();
    }
    let truncated = interpreter_bridge_core::text::truncate_chars(line, MAX_CHARS);
    if truncated.len() < line.len() {
        format!("{}...", truncated)
    } else {
        truncated.to_string()
    }
}
