//! Command output classification and user-facing summaries

use interpreter_bridge_core::locale::Locale;
use interpreter_bridge_core::text::truncate_chars;

use crate::pattern::{first_group, lazy_regex, start_process_target};

/// Placeholder runners return when a command printed nothing.
pub const NO_OUTPUT: &str = "(no output)";

const SUMMARY_OUTPUT_CHARS: usize = 1_200;

const ERROR_PATTERNS: &[&str] = &[
    "parsererror",
    "commandnotfoundexception",
    "the term",
    "is not recognized",
    "missing closing",
    "unexpected token",
    "write-error",
    "at line:",
];

lazy_regex!(first_int_pattern, r"-?\d+");

/// Obvious execution errors in console output.
pub fn looks_like_error_output(output: &str) -> bool {
    let lowered = output.to_lowercase();
    ERROR_PATTERNS.iter().any(|p| lowered.contains(p))
}

/// Process-table shaped output (`Get-Process`, `tasklist`).
pub fn looks_like_process_snapshot(output: &str) -> bool {
    let lowered = output.to_lowercase();
    lowered.contains("processname") && (lowered.contains("workingset") || lowered.contains("id"))
}

/// First meaningful error line, skipping PowerShell position markers.
pub fn first_error_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.to_lowercase().starts_with("at line:"))
        .unwrap_or("Unknown error.")
        .to_string()
}

fn first_int(text: &str) -> Option<i64> {
    first_int_pattern()?.find(text)?.as_str().parse().ok()
}

fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// One short message describing what a structured command did.
pub fn summarize(code: &str, output: &str, locale: Locale) -> String {
    let lowered = code.to_lowercase();

    if looks_like_error_output(output) {
        let reason = first_error_line(output);
        return match locale {
            Locale::English => format!("Command failed.\nReason: {}", reason),
            Locale::Arabic => format!("فشل تنفيذ الأمر.\nالسبب: {}", reason),
        };
    }

    if lowered.contains("measure-object") && lowered.contains("mainwindowtitle") {
        if let Some(count) = first_int(output) {
            return match locale {
                Locale::English => format!("Open windows count: {}", count),
                Locale::Arabic => format!("عدد النوافذ المفتوحة حاليًا: {}", count),
            };
        }
    }

    if lowered.contains("start-process") {
        let target = start_process_target()
            .and_then(|re| re.captures(code))
            .map(|caps| first_group(&caps))
            .unwrap_or_default();
        let target = target.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
        if target.is_empty() {
            return locale
                .pick(
                    "Launch command executed successfully.",
                    "تم تنفيذ أمر تشغيل التطبيق بنجاح.",
                )
                .to_string();
        }
        return match locale {
            Locale::English => format!("Application launched: {}\nPath: {}", file_name(target), target),
            Locale::Arabic => format!(
                "تم تشغيل التطبيق بنجاح: {}\nالمسار: {}",
                file_name(target),
                target
            ),
        };
    }

    if lowered.contains("explorer.exe") || lowered.starts_with("explorer ") {
        return locale
            .pick("File Explorer opened successfully.", "تم فتح مستكشف الملفات بنجاح.")
            .to_string();
    }

    if lowered.contains("imagegrab.grab")
        || (lowered.contains("screenshot")
            && (lowered.contains("pyautogui") || lowered.contains("imagegrab")))
    {
        return locale
            .pick(
                "Screen capture request executed successfully.",
                "تم تنفيذ طلب التقاط الشاشة بنجاح.",
            )
            .to_string();
    }

    if lowered.contains("pyautogui.") {
        return locale
            .pick(
                "Desktop control command executed successfully.",
                "تم تنفيذ أمر التحكم بسطح المكتب بنجاح.",
            )
            .to_string();
    }

    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == NO_OUTPUT {
        return locale
            .pick("Command executed successfully.", "تم تنفيذ الأمر بنجاح.")
            .to_string();
    }

    let shown = truncate_chars(output, SUMMARY_OUTPUT_CHARS);
    match locale {
        Locale::English => format!("Command executed.\nOutput:\n{}", shown),
        Locale::Arabic => format!("تم تنفيذ الأمر.\nالناتج:\n{}", shown),
    }
}
