//! Regex salvage of malformed payloads
//!
//! When a tool-call payload is too mangled to parse, one command may still be
//! recoverable from a small set of known-safe shapes. Salvage never invents a
//! command outside those shapes.

use crate::pattern::lazy_regex;

const WINDOW_COUNT_COMMAND: &str = "Get-Process | Where-Object {$_.MainWindowTitle -ne ''} | \
Measure-Object | Select-Object -ExpandProperty Count";
const WINDOW_LIST_COMMAND: &str =
    "Get-Process | Where-Object {$_.MainWindowTitle -ne ''} | Select-Object ProcessName, MainWindowTitle";
const TOP_MEMORY_COMMAND: &str = "Get-Process | Sort-Object -Property WorkingSet -Descending | \
Select-Object -First 5 -Property ProcessName, WorkingSet, CPU, Id";

lazy_regex!(
    quoted_start_target,
    r#"(?i)start-process(?:\s+-filepath)?[ \t]+(?:"([^"]+)"|'([^']+)')"#
);
lazy_regex!(exe_path, r#"([a-zA-Z]:\\[^\n\r"']+?\.exe)"#);
lazy_regex!(bare_start_target, r"(?i)start-process(?:\s+-filepath)?[ \t]+([^\s{}\n\r]+)");
lazy_regex!(explorer_path, r#"(?i)explorer(?:\.exe)?\s+"?([a-zA-Z]:\\[^\n\r"']+)"?"#);
lazy_regex!(code_field, r#"(?i)"code"\s*:\s*"([\s\S]+?)"\s*\}\s*\}?"#);

/// Cut a target at the first real or escaped line break and drop trailing `,`/`;`.
fn first_line_target(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
    let head = ["\\n", "\\r", "\n", "\r"]
        .iter()
        .fold(trimmed, |acc, sep| acc.split(sep).next().unwrap_or(acc));
    head.trim_end_matches([',', ';']).to_string()
}

fn start_process(target: &str) -> String {
    format!("Start-Process -FilePath \"{}\"", target)
}

/// Recover one safe PowerShell command from malformed payload text.
pub fn salvage_powershell(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let cleaned = text.replace('\r', "\n");
    let lowered = cleaned.to_lowercase();

    if lowered.contains("start-process") {
        if let Some(caps) = quoted_start_target().and_then(|re| re.captures(&cleaned)) {
            let raw = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            let target = first_line_target(raw);
            if !target.is_empty() {
                return Some(start_process(&target));
            }
        }

        if let Some(m) = exe_path().and_then(|re| re.captures(&cleaned)).and_then(|c| c.get(1)) {
            return Some(start_process(m.as_str().trim()));
        }

        if let Some(m) = bare_start_target()
            .and_then(|re| re.captures(&cleaned))
            .and_then(|c| c.get(1))
        {
            let mut target = first_line_target(m.as_str());
            if !target.is_empty() {
                let is_uri_like = target.contains(':') && !target.contains('\\');
                if !is_uri_like
                    && !target.to_lowercase().ends_with(".exe")
                    && !target.contains('\\')
                {
                    target.push_str(".exe");
                }
                return Some(start_process(&target));
            }
        }
    }

    if lowered.contains("explorer.exe") || lowered.trim().starts_with("explorer ") {
        if let Some(m) = explorer_path()
            .and_then(|re| re.captures(&cleaned))
            .and_then(|c| c.get(1))
        {
            let path = m.as_str().trim().trim_end_matches([',', ';']);
            return Some(format!("explorer.exe \"{}\"", path));
        }
        return Some("explorer.exe".to_string());
    }

    if lowered.contains("get-process") && lowered.contains("mainwindowtitle") {
        if lowered.contains("measure-object") {
            return Some(WINDOW_COUNT_COMMAND.to_string());
        }
        return Some(WINDOW_LIST_COMMAND.to_string());
    }

    if lowered.contains("get-process") && lowered.contains("workingset") {
        return Some(TOP_MEMORY_COMMAND.to_string());
    }

    None
}

fn is_allowed_import(line: &str) -> bool {
    let modules: Vec<String> = line[7..]
        .split(',')
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect();
    !modules.is_empty() && modules.iter().all(|m| m == "pyautogui" || m == "time")
}

/// Recover a desktop-automation Python snippet (`pyautogui`/`time` only).
pub fn salvage_python(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let cleaned = text.replace('\r', "\n");
    let lowered = cleaned.to_lowercase();
    if !lowered.contains("pyautogui") && !lowered.contains("time.sleep") {
        return None;
    }

    let candidate = code_field()
        .and_then(|re| re.captures(&cleaned))
        .and_then(|c| c.get(1))
        .map_or(cleaned.as_str(), |m| m.as_str())
        .replace("\\\"", "\"")
        .replace("\\n", "\n");

    let mut lines: Vec<String> = Vec::new();
    for raw in candidate.lines() {
        let line = raw
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .trim_end_matches([',', '}'])
            .trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if lower.starts_with("import ") {
            if is_allowed_import(line) {
                lines.push(line.to_string());
            }
            continue;
        }
        if lower.starts_with("pyautogui.") || lower.starts_with("time.sleep(") {
            lines.push(line.to_string());
        }
    }

    if lines.is_empty() {
        return None;
    }
    let has_call = lines.iter().any(|l| l.to_lowercase().starts_with("pyautogui."));
    let has_import = lines
        .iter()
        .any(|l| l.to_lowercase().starts_with("import pyautogui"));
    if has_call && !has_import {
        lines.insert(0, "import pyautogui".to_string());
    }
    Some(lines.join("\n"))
}
