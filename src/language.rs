//! Supported languages and locale lookups.
//!
//! The list is static reference data. Locale codes are what the speech engines
//! are configured with; names are what the translation prompt sees.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en-US", name: "English (US)" },
    Language { code: "en-GB", name: "English (UK)" },
    Language { code: "es-ES", name: "Spanish (Spain)" },
    Language { code: "es-MX", name: "Spanish (Mexico)" },
    Language { code: "fr-FR", name: "French" },
    Language { code: "de-DE", name: "German" },
    Language { code: "it-IT", name: "Italian" },
    Language { code: "pt-BR", name: "Portuguese (Brazil)" },
    Language { code: "nl-NL", name: "Dutch" },
    Language { code: "pl-PL", name: "Polish" },
    Language { code: "ru-RU", name: "Russian" },
    Language { code: "uk-UA", name: "Ukrainian" },
    Language { code: "tr-TR", name: "Turkish" },
    Language { code: "ar-SA", name: "Arabic" },
    Language { code: "hi-IN", name: "Hindi" },
    Language { code: "ja-JP", name: "Japanese" },
    Language { code: "ko-KR", name: "Korean" },
    Language { code: "zh-CN", name: "Chinese (Mandarin)" },
    Language { code: "vi-VN", name: "Vietnamese" },
];

pub fn find_language(code: &str) -> Option<&'static Language> {
    SUPPORTED_LANGUAGES.iter().find(|l| l.code == code)
}

/// Name handed to the translation backend. Unknown codes pass through as-is
/// so the model still gets something it can interpret.
pub fn prompt_name(code: &str) -> String {
    find_language(code)
        .map(|l| l.name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Name shown to the user.
pub fn display_name(code: &str) -> &'static str {
    find_language(code).map(|l| l.name).unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_resolves_to_name() {
        assert_eq!(prompt_name("es-ES"), "Spanish (Spain)");
        assert_eq!(display_name("ja-JP"), "Japanese");
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(prompt_name("xx-YY"), "xx-YY");
        assert_eq!(display_name("xx-YY"), "Unknown");
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = SUPPORTED_LANGUAGES.iter().map(|l| l.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), SUPPORTED_LANGUAGES.len());
    }
}
