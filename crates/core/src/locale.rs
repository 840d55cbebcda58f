//! Locale Selection
//!
//! User-facing notices are pre-localized. The locale is chosen once per
//! request from the user's message: any Arabic script selects Arabic,
//! everything else falls back to English.

use serde::{Deserialize, Serialize};

/// Language used for user-facing notices and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    English,
    Arabic,
}

impl Locale {
    /// Pick the locale for a request message.
    pub fn detect(text: &str) -> Self {
        if contains_arabic(text) {
            Locale::Arabic
        } else {
            Locale::English
        }
    }

    /// Select between an English and an Arabic rendering.
    pub fn pick<'a>(self, english: &'a str, arabic: &'a str) -> &'a str {
        match self {
            Locale::English => english,
            Locale::Arabic => arabic,
        }
    }

    /// Returns true for Arabic.
    pub fn is_arabic(self) -> bool {
        matches!(self, Locale::Arabic)
    }
}

/// Returns true when the text contains characters from the Arabic block.
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}
