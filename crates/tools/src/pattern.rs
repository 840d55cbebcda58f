//! Lazily compiled regex helpers shared by the text classifiers.

use regex::Regex;
use std::sync::OnceLock;

/// Compile `pattern` into `cell` on first use.
pub(crate) fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

pub(crate) fn is_match(re: Option<&Regex>, text: &str) -> bool {
    re.is_some_and(|r| r.is_match(text))
}

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static ::regex::Regex> {
            static RE: ::std::sync::OnceLock<Option<::regex::Regex>> = ::std::sync::OnceLock::new();
            $crate::pattern::compiled(&RE, $pattern)
        }
    };
}

pub(crate) use lazy_regex;

/// `start-process [-filepath] <target>` with a quoted or bare target.
pub(crate) fn start_process_target() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r#"(?i)start-process(?:\s+-filepath)?\s+(?:"([^"]+)"|'([^']+)'|([^\s|;]+))"#,
    )
}

/// First non-empty capture group of a match.
pub(crate) fn first_group(caps: &regex::Captures<'_>) -> String {
    (1..caps.len())
        .filter_map(|i| caps.get(i))
        .map(|m| m.as_str())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
