//! Translation provider adapters.
//!
//! The set of backends is closed: [`Provider`] is a tagged enum with one
//! variant per backend, dispatched by `match`. Each adapter maps its native
//! failures onto the provider-agnostic [`ProviderError`].

pub mod deepl;
pub mod helsinki;
pub mod mymemory;
mod quota;

pub use deepl::DeepL;
pub use helsinki::Helsinki;
pub use mymemory::MyMemory;
pub use quota::{DailyQuota, Reservation};

use crate::credentials::Credential;
use crate::languages::Language;
use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a translation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    MyMemory,
    Helsinki,
    DeepL,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::MyMemory, ProviderId::Helsinki, ProviderId::DeepL];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::MyMemory => "mymemory",
            ProviderId::Helsinki => "helsinki",
            ProviderId::DeepL => "deepl",
        }
    }

    /// Whether a call needs a secret, or can run anonymously.
    pub fn credential_policy(&self) -> CredentialPolicy {
        match self {
            ProviderId::MyMemory => CredentialPolicy::Optional,
            ProviderId::Helsinki | ProviderId::DeepL => CredentialPolicy::Required,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mymemory" => Ok(ProviderId::MyMemory),
            "helsinki" => Ok(ProviderId::Helsinki),
            "deepl" => Ok(ProviderId::DeepL),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialPolicy {
    Required,
    Optional,
}

/// Provider-agnostic failure kind, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Unauthorized,
    QuotaExceeded,
    UnsupportedPair,
    Timeout,
    Unavailable,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Unauthorized => "unauthorized",
            ProviderErrorKind::QuotaExceeded => "quota_exceeded",
            ProviderErrorKind::UnsupportedPair => "unsupported_pair",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("unsupported language pair {source_lang}->{target_lang}")]
    UnsupportedPair {
        source_lang: String,
        target_lang: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Unauthorized(_) => ProviderErrorKind::Unauthorized,
            ProviderError::QuotaExceeded(_) => ProviderErrorKind::QuotaExceeded,
            ProviderError::UnsupportedPair { .. } => ProviderErrorKind::UnsupportedPair,
            ProviderError::Timeout => ProviderErrorKind::Timeout,
            ProviderError::Unavailable(_) => ProviderErrorKind::Unavailable,
        }
    }

    pub(crate) fn unsupported(source: Language, target: Language) -> Self {
        ProviderError::UnsupportedPair {
            source_lang: source.code().to_string(),
            target_lang: target.code().to_string(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

/// Shared mapping of non-success HTTP statuses. Adapters handle their own
/// special codes before falling back to this.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("{}: {}", status, truncate(body, 200));
    match status.as_u16() {
        401 | 403 => ProviderError::Unauthorized(detail),
        429 => ProviderError::QuotaExceeded(detail),
        408 | 504 => ProviderError::Timeout,
        _ => ProviderError::Unavailable(detail),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Reads a non-success response body for error details.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e))
}

/// A configured translation backend.
#[derive(Debug)]
pub enum Provider {
    MyMemory(MyMemory),
    Helsinki(Helsinki),
    DeepL(DeepL),
}

impl Provider {
    pub fn id(&self) -> ProviderId {
        match self {
            Provider::MyMemory(_) => ProviderId::MyMemory,
            Provider::Helsinki(_) => ProviderId::Helsinki,
            Provider::DeepL(_) => ProviderId::DeepL,
        }
    }

    pub fn supports_pair(&self, source: Language, target: Language) -> bool {
        if source == target {
            return false;
        }
        match self {
            Provider::MyMemory(p) => p.supports_pair(source, target),
            Provider::Helsinki(p) => p.supports_pair(source, target),
            Provider::DeepL(p) => p.supports_pair(source, target),
        }
    }

    /// Translate `text` with exactly one network call.
    pub async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        if !self.supports_pair(source, target) {
            return Err(ProviderError::unsupported(source, target));
        }
        match self {
            Provider::MyMemory(p) => p.translate(text, source, target, credential).await,
            Provider::Helsinki(p) => p.translate(text, source, target, credential).await,
            Provider::DeepL(p) => p.translate(text, source, target, credential).await,
        }
    }

    /// Probe a key with a one-word translation.
    ///
    /// Returns `Ok(false)` when the provider rejected the key and `Err` for
    /// any other failure, so callers can tell "bad key" from "provider down".
    pub async fn verify_key(&self, secret: &str) -> Result<bool, ProviderError> {
        let credential = Credential::probe(secret);
        let (source, target) = match self {
            Provider::Helsinki(_) => (Language::ENGLISH, Language::FRENCH),
            _ => (Language::ENGLISH, Language::CHINESE),
        };
        match self.translate("test", source, target, &credential).await {
            Ok(_) => Ok(true),
            Err(ProviderError::Unauthorized(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
