//! Language resolution: full name or bare code to a 2-letter ISO 639-1 code.
//! Unknown input is handled by the caller (falls back to English with a warning).

/// Language names (lower-case) mapped to 2-letter ISO 639-1 codes.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("arabic", "ar"),
    ("bengali", "bn"),
    ("bulgarian", "bg"),
    ("chinese", "zh"),
    ("croatian", "hr"),
    ("czech", "cs"),
    ("danish", "da"),
    ("dutch", "nl"),
    ("english", "en"),
    ("estonian", "et"),
    ("finnish", "fi"),
    ("french", "fr"),
    ("german", "de"),
    ("greek", "el"),
    ("hebrew", "he"),
    ("hindi", "hi"),
    ("hungarian", "hu"),
    ("indonesian", "id"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("latvian", "lv"),
    ("lithuanian", "lt"),
    ("norwegian", "no"),
    ("persian", "fa"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("romanian", "ro"),
    ("russian", "ru"),
    ("serbian", "sr"),
    ("slovak", "sk"),
    ("slovenian", "sl"),
    ("spanish", "es"),
    ("swahili", "sw"),
    ("swedish", "sv"),
    ("thai", "th"),
    ("turkish", "tr"),
    ("ukrainian", "uk"),
    ("vietnamese", "vi"),
];

/// A resolved language: display name (for prompts) and 2-letter code (for EPUB metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub name: String,
    pub code: String,
}

impl Language {
    pub fn english() -> Self {
        Language {
            name: "English".to_string(),
            code: "en".to_string(),
        }
    }
}

/// Resolve a language from a full name ("French") or a bare code ("fr").
/// Case-insensitive. Returns None for unknown input.
pub fn resolve(input: &str) -> Option<Language> {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    // Bare 2-letter code
    if let Some((name, code)) = LANGUAGE_CODES.iter().find(|(_, c)| *c == lower) {
        return Some(Language {
            name: capitalize(name),
            code: (*code).to_string(),
        });
    }
    // Full name
    LANGUAGE_CODES
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(name, code)| Language {
            name: capitalize(name),
            code: (*code).to_string(),
        })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_by_name() {
        let lang = resolve("French").unwrap();
        assert_eq!(lang.name, "French");
        assert_eq!(lang.code, "fr");
    }

    #[test]
    fn resolve_by_name_case_insensitive() {
        assert_eq!(resolve("GERMAN").unwrap().code, "de");
        assert_eq!(resolve("german").unwrap().code, "de");
    }

    #[test]
    fn resolve_by_code() {
        let lang = resolve("ja").unwrap();
        assert_eq!(lang.name, "Japanese");
        assert_eq!(lang.code, "ja");
    }

    #[test]
    fn resolve_trims_whitespace() {
        assert_eq!(resolve("  spanish  ").unwrap().code, "es");
    }

    #[test]
    fn resolve_unknown_is_none() {
        assert!(resolve("klingon").is_none());
        assert!(resolve("").is_none());
    }

    #[test]
    fn english_default() {
        let lang = Language::english();
        assert_eq!(lang.name, "English");
        assert_eq!(lang.code, "en");
    }
}
