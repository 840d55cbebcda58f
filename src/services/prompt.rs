//! Prompt Assembly
//!
//! Builds the per-request system prompt prefix and the conversation
//! preamble placed in front of the user's message.

use interpreter_bridge_core::request::HistoryEntry;
use interpreter_bridge_core::text::{collapse_whitespace, truncate_chars};
use interpreter_bridge_tools::noise::is_noisy_execution_text;

/// Rules appended to every request's system prompt.
pub const EXECUTION_GUARDRAILS: &str = "Execution guardrails:
- Target OS is Windows. Use PowerShell for system commands unless user explicitly requests Python.
- For desktop automation (mouse/keyboard/UI control), use Python with pyautogui.
- Use exactly one execution language per response and do not switch languages mid-task.
- Never output Markdown code fences/backticks in executable commands.
- Never emit incomplete code. Ensure brackets, quotes, and command syntax are complete before running.
- If execution fails, do one fix-and-retry only. If it still fails, stop and ask the user for output/screenshot.
- Avoid repetitive actions. Do not run the same command repeatedly unless the user explicitly asks.
- Do not repeatedly open GUI apps (for example Task Manager) in loops.
- If the user writes in Arabic, answer in clear Arabic.
- Never expose raw execute JSON payloads in user-facing responses.
- Never claim an action succeeded unless execution output/tool result confirms it.
- If uncertain or blocked, say that clearly instead of guessing.";

const CONTEXT_HEADER: &str = "[Recent conversation context]";
const CONTEXT_FOOTER: &str = "[End of context]\n";

/// Caller prompt (if any) followed by the guardrails.
pub fn effective_system_prompt(caller_prompt: Option<&str>) -> String {
    match caller_prompt.filter(|p| !p.is_empty()) {
        Some(base) => format!("{}\n\n{}", base, EXECUTION_GUARDRAILS),
        None => EXECUTION_GUARDRAILS.to_string(),
    }
}

/// Summary of the most recent history entries, or an empty string when
/// there is no history. Empty and payload-noise entries are skipped.
pub fn history_preamble(history: &[HistoryEntry], limit: usize, entry_chars: usize) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut lines = vec![CONTEXT_HEADER.to_string()];
    let start = history.len().saturating_sub(limit);
    for entry in &history[start..] {
        if entry.content.is_empty() || is_noisy_execution_text(&entry.content) {
            continue;
        }
        let content = collapse_whitespace(&entry.content);
        if content.is_empty() {
            continue;
        }
        let content = if content.chars().count() > entry_chars {
            format!("{}...", truncate_chars(&content, entry_chars))
        } else {
            content
        };
        lines.push(format!("{}: {}", capitalize(&entry.role), content));
    }
    lines.push(CONTEXT_FOOTER.to_string());
    lines.join("\n")
}

/// The message actually sent to the engine.
pub fn compose_message(
    message: &str,
    history: &[HistoryEntry],
    limit: usize,
    entry_chars: usize,
) -> String {
    format!("{}{}", history_preamble(history, limit, entry_chars), message)
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}
