//! Session languages, device locales, and the short phrases the session speaks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The languages a session can speak and listen in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Thai,
    English,
}

impl Language {
    /// The BCP-47 locale handed to the device synthesizer and recognizer.
    pub fn locale(self) -> Locale {
        match self {
            Language::Thai => Locale::new("th-TH"),
            Language::English => Locale::new("en-US"),
        }
    }

    /// English name of the language, as used in generation prompts.
    pub fn name(self) -> &'static str {
        match self {
            Language::Thai => "Thai",
            Language::English => "English",
        }
    }

    pub fn phrases(self) -> &'static Phrases {
        match self {
            Language::Thai => &THAI_PHRASES,
            Language::English => &ENGLISH_PHRASES,
        }
    }

    /// Parses a short code (`th`, `en`), a locale (`th-TH`) or a name (`thai`).
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        let primary = code.split(['-', '_']).next().unwrap_or_default();
        match primary {
            "th" | "thai" => Some(Language::Thai),
            "en" | "english" => Some(Language::English),
            _ => None,
        }
    }
}

/// A device locale tag such as `th-TH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares two tags ignoring case and `_`/`-` differences
    /// (Android voices report `th_TH`, browsers `th-TH`).
    pub fn matches(&self, other: &str) -> bool {
        normalize(&self.0) == normalize(other)
    }
}

fn normalize(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed lines spoken or shown by the controller, one table per language.
#[derive(Debug)]
pub struct Phrases {
    pub affirmation: &'static str,
    pub retry: &'static str,
    pub didnt_hear: &'static str,
    pub recognition_failed: &'static str,
    pub fallback_opening: &'static str,
    pub fallback_continuation: &'static str,
    pub fallback_closing: &'static str,
    pub fallback_title: &'static str,
}

static THAI_PHRASES: Phrases = Phrases {
    affirmation: "เก่งมาก! ถูกต้องแล้ว",
    retry: "เกือบแล้ว ลองพูดอีกครั้งนะ",
    didnt_hear: "ขอโทษนะ ไม่ได้ยินเลย ลองพูดอีกครั้งได้ไหม",
    recognition_failed: "ไมโครโฟนมีปัญหานิดหน่อย ลองกดอีกครั้งนะ",
    fallback_opening: "เกิดข้อผิดพลาดในการสร้างเรื่องราว",
    fallback_continuation: "AI กำลังคิดเรื่องราวต่อ... แต่เกิดข้อผิดพลาด",
    fallback_closing: "นิทานของเราจบลงแล้วอย่างมีความสุข!",
    fallback_title: "นิทานของฉัน",
};

static ENGLISH_PHRASES: Phrases = Phrases {
    affirmation: "Great job! That's right!",
    retry: "Almost! Let's try saying it again.",
    didnt_hear: "Sorry, I couldn't hear you. Can you say it again?",
    recognition_failed: "The microphone had a little problem. Let's try again.",
    fallback_opening: "Something went wrong while creating the story.",
    fallback_continuation: "The story is thinking about what happens next... but something went wrong.",
    fallback_closing: "And our story ended happily ever after!",
    fallback_title: "My Story",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("th"), Some(Language::Thai));
        assert_eq!(Language::from_code("th-TH"), Some(Language::Thai));
        assert_eq!(Language::from_code(" English "), Some(Language::English));
        assert_eq!(Language::from_code("en_US"), Some(Language::English));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn test_locale_matching_ignores_case_and_separator() {
        let locale = Language::Thai.locale();
        assert!(locale.matches("th_TH"));
        assert!(locale.matches("TH-th"));
        assert!(!locale.matches("en-US"));
        assert_eq!(locale.to_string(), "th-TH");
    }

    #[test]
    fn test_fallback_title_per_language() {
        assert_eq!(Language::Thai.phrases().fallback_title, "นิทานของฉัน");
        assert_eq!(Language::English.phrases().fallback_title, "My Story");
    }
}
