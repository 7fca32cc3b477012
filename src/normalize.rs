//! Request normalization and cache-key derivation.
//!
//! Two requests that differ only in incidental whitespace, Unicode
//! composition form or language-code casing map to the same key.

use crate::error::TranslateError;
use crate::languages::Language;
use crate::providers::ProviderId;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Longest accepted text, counted in characters after normalization.
pub const MAX_TEXT_CHARS: usize = 5000;

const KEY_PREFIX: &str = "trans";

/// Canonical form of a translation request, used only for cache lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedKey {
    text: String,
    source: Language,
    target: Language,
    provider: Option<ProviderId>,
}

impl NormalizedKey {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Language {
        self.source
    }

    pub fn target(&self) -> Language {
        self.target
    }

    pub fn provider(&self) -> Option<ProviderId> {
        self.provider
    }

    /// Source and target are the same language.
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Bind the key to an explicitly requested provider (`None` means automatic selection).
    pub fn with_provider(mut self, provider: Option<ProviderId>) -> Self {
        self.provider = provider;
        self
    }

    /// Backing-store key: `trans:<sha256 hex>` over every component.
    pub fn cache_key(&self) -> String {
        let provider = self.provider.map(|p| p.as_str()).unwrap_or("auto");
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.source.code().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.target.code().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(provider.as_bytes());
        format!("{}:{:x}", KEY_PREFIX, hasher.finalize())
    }
}

/// Canonicalize raw request fields.
///
/// Applies NFC, trims and collapses whitespace runs to a single space, and
/// validates both language codes.
pub fn normalize(
    text: &str,
    source_lang: &str,
    target_lang: &str,
) -> Result<NormalizedKey, TranslateError> {
    let source = Language::from_code(source_lang).ok_or_else(|| {
        TranslateError::InvalidInput(format!("unknown source language '{}'", source_lang))
    })?;
    let target = Language::from_code(target_lang).ok_or_else(|| {
        TranslateError::InvalidInput(format!("unknown target language '{}'", target_lang))
    })?;

    let composed: String = text.nfc().collect();
    let canonical = composed.split_whitespace().collect::<Vec<_>>().join(" ");

    if canonical.is_empty() {
        return Err(TranslateError::InvalidInput(
            "text is empty after trimming".to_string(),
        ));
    }

    let chars = canonical.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(TranslateError::InvalidInput(format!(
            "text is {} characters, limit is {}",
            chars, MAX_TEXT_CHARS
        )));
    }

    Ok(NormalizedKey {
        text: canonical,
        source,
        target,
        provider: None,
    })
}
