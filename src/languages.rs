//! Language registry: the set of language codes the gateway accepts.
//!
//! The registry is an immutable table built once on first access with
//! `OnceLock`. `Language` values can only be obtained through it, so holding a
//! `Language` means the code has already been validated.

use std::fmt;
use std::sync::OnceLock;

/// Metadata for one supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "zh")
    pub code: &'static str,

    /// English name of the language
    pub name: &'static str,
}

/// Lookup table of every accepted language code.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the registry, building it on first call.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Find a language by its (already lower-cased) code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All registered languages, in table order.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }
}

/// A validated language code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    code: &'static str,
}

impl Language {
    pub const ENGLISH: Language = Language { code: "en" };
    pub const CHINESE: Language = Language { code: "zh" };
    pub const FRENCH: Language = Language { code: "fr" };

    /// Canonicalize and validate a language code.
    ///
    /// Surrounding whitespace is ignored and the code is lower-cased before
    /// lookup. Returns `None` for codes outside the registry.
    pub fn from_code(code: &str) -> Option<Language> {
        let canonical = code.trim().to_ascii_lowercase();
        LanguageRegistry::get()
            .get_by_code(&canonical)
            .map(|config| Language { code: config.code })
    }

    /// ISO 639-1 code, always lower-case.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// English name of the language.
    pub fn name(&self) -> &'static str {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .map(|config| config.name)
            .unwrap_or(self.code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    [
        ("ar", "Arabic"),
        ("bg", "Bulgarian"),
        ("cs", "Czech"),
        ("da", "Danish"),
        ("de", "German"),
        ("el", "Greek"),
        ("en", "English"),
        ("es", "Spanish"),
        ("et", "Estonian"),
        ("fi", "Finnish"),
        ("fr", "French"),
        ("he", "Hebrew"),
        ("hi", "Hindi"),
        ("hu", "Hungarian"),
        ("id", "Indonesian"),
        ("it", "Italian"),
        ("ja", "Japanese"),
        ("ko", "Korean"),
        ("lt", "Lithuanian"),
        ("lv", "Latvian"),
        ("nb", "Norwegian Bokmål"),
        ("nl", "Dutch"),
        ("pl", "Polish"),
        ("pt", "Portuguese"),
        ("ro", "Romanian"),
        ("ru", "Russian"),
        ("sk", "Slovak"),
        ("sl", "Slovenian"),
        ("sv", "Swedish"),
        ("th", "Thai"),
        ("tr", "Turkish"),
        ("uk", "Ukrainian"),
        ("vi", "Vietnamese"),
        ("zh", "Chinese"),
    ]
    .into_iter()
    .map(|(code, name)| LanguageConfig { code, name })
    .collect()
}
