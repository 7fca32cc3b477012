//! Error taxonomy surfaced by the translation core.
//!
//! Callers get one of four kinds. Cache failures are absent on purpose: the
//! cache degrades locally and never reaches the caller.

use crate::credentials::CredentialError;
use crate::providers::{ProviderErrorKind, ProviderId};
use serde::Serialize;
use thiserror::Error;

/// One failed candidate in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: ProviderErrorKind,
}

/// Errors returned by [`crate::orchestrator::Orchestrator::translate`].
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("no provider could serve the request: {}", format_failures(.failures))]
    ProviderUnavailable { failures: Vec<ProviderFailure> },

    #[error("request cancelled by client")]
    Cancelled,
}

impl TranslateError {
    /// Stable machine-readable kind for structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslateError::InvalidInput(_) => "invalid_input",
            TranslateError::Credential(_) => "credential_error",
            TranslateError::ProviderUnavailable { .. } => "provider_unavailable",
            TranslateError::Cancelled => "cancelled",
        }
    }

    /// True when the client can fix the request (bad input or bad credentials).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranslateError::InvalidInput(_) | TranslateError::Credential(_)
        )
    }

    /// Per-candidate failures, empty unless the error is `ProviderUnavailable`.
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            TranslateError::ProviderUnavailable { failures } => failures,
            _ => &[],
        }
    }
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no candidates".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}={}", f.provider, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}
