//! Request orchestration.
//!
//! One request flows through normalization, a cache lookup, credential
//! resolution, an ordered fallback over the candidate providers and finally a
//! cache write. Each candidate gets at most one network call.

use crate::cache::{AdaptiveCache, CacheLookup, CacheStats};
use crate::credentials::{Credential, CredentialError, CredentialResolver};
use crate::error::{ProviderFailure, TranslateError};
use crate::metrics::{MetricsReport, TranslationMetrics};
use crate::normalize::{normalize, NormalizedKey};
use crate::providers::{Provider, ProviderError, ProviderErrorKind, ProviderId};
use crate::registry::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reported as `provider_used` when source and target are the same language.
pub const IDENTITY_PROVIDER: &str = "identity";

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,

    /// Explicit provider name; absent or `"auto"` lets the registry choose
    #[serde(default)]
    pub provider: Option<String>,

    /// Authenticated caller, set by the routing layer
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResponse {
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub provider_used: String,
    pub cached: bool,

    /// Popularity of the cache entry after this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
}

pub struct Orchestrator {
    registry: ProviderRegistry,
    credentials: CredentialResolver,
    cache: AdaptiveCache,
    metrics: Arc<TranslationMetrics>,
    provider_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: ProviderRegistry,
        credentials: CredentialResolver,
        cache: AdaptiveCache,
        metrics: Arc<TranslationMetrics>,
    ) -> Self {
        Self {
            registry,
            credentials,
            cache,
            metrics,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Upper bound for a single provider call.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationResponse, TranslateError> {
        let explicit = parse_provider(request.provider.as_deref())?;
        let key = normalize(&request.text, &request.source_lang, &request.target_lang)?
            .with_provider(explicit);

        if key.is_identity() {
            self.metrics.record_identity();
            debug!(lang = %key.source(), "Source equals target, returning input");
            return Ok(TranslationResponse {
                translated_text: request.text.clone(),
                original_text: request.text,
                source_lang: key.source().code().to_string(),
                target_lang: key.target().code().to_string(),
                provider_used: IDENTITY_PROVIDER.to_string(),
                cached: false,
                hit_count: None,
            });
        }

        let cache_key = key.cache_key();
        match self.cache.lookup(&cache_key).await {
            CacheLookup::Hit(entry) => {
                info!(
                    provider = %entry.provider_used,
                    hit_count = entry.hit_count,
                    "Served translation from cache"
                );
                return Ok(respond(
                    request.text,
                    &key,
                    entry.translated_text,
                    entry.provider_used,
                    true,
                    Some(entry.hit_count),
                ));
            }
            CacheLookup::Miss => debug!("Cache miss"),
            CacheLookup::Unavailable => debug!("Cache unavailable, translating uncached"),
        }

        let candidates = self
            .registry
            .candidates(explicit, key.source(), key.target())?;
        let resolved = self
            .resolve_credentials(&request.user_id, &candidates, explicit.is_some())
            .await?;

        let mut failures = Vec::with_capacity(resolved.len());
        for (provider, credential) in resolved {
            let id = provider.id();
            let Some(credential) = credential else {
                debug!(provider = %id, "Skipping provider without credential");
                failures.push(ProviderFailure {
                    provider: id,
                    kind: ProviderErrorKind::Unauthorized,
                });
                continue;
            };

            match self.call_provider(provider, &key, &credential).await {
                Ok(translated) => {
                    self.cache.put(&cache_key, &translated, id).await;
                    info!(
                        provider = %id,
                        credential = credential.source(),
                        failed_before = failures.len(),
                        "Translated {}->{}",
                        key.source(),
                        key.target()
                    );
                    return Ok(respond(
                        request.text,
                        &key,
                        translated,
                        id.as_str().to_string(),
                        false,
                        Some(1),
                    ));
                }
                Err(e) => {
                    warn!(provider = %id, "Provider failed: {}", e);
                    failures.push(ProviderFailure {
                        provider: id,
                        kind: e.kind(),
                    });
                }
            }
        }

        Err(TranslateError::ProviderUnavailable { failures })
    }

    /// [`Orchestrator::translate`], abandoned as soon as `cancel` fires.
    ///
    /// The in-flight provider call is dropped and nothing is cached for a
    /// cancelled request.
    pub async fn translate_with_cancel(
        &self,
        request: TranslationRequest,
        cancel: &CancellationToken,
    ) -> Result<TranslationResponse, TranslateError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Translation cancelled by client");
                Err(TranslateError::Cancelled)
            }
            result = self.translate(request) => result,
        }
    }

    /// Check a plaintext key against the provider with a one-word probe.
    pub async fn verify_key(
        &self,
        provider: ProviderId,
        secret: &str,
    ) -> Result<bool, TranslateError> {
        let unavailable = |kind| TranslateError::ProviderUnavailable {
            failures: vec![ProviderFailure { provider, kind }],
        };
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| unavailable(ProviderErrorKind::Unavailable))?;

        match tokio::time::timeout(self.provider_timeout, adapter.verify_key(secret)).await {
            Ok(Ok(valid)) => Ok(valid),
            Ok(Err(e)) => Err(unavailable(e.kind())),
            Err(_) => Err(unavailable(ProviderErrorKind::Timeout)),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    /// Every candidate's credential is settled before the first call so a
    /// broken stored secret costs no provider traffic.
    ///
    /// In automatic mode a missing required credential only disqualifies that
    /// candidate (`None`); an explicitly requested provider must have one.
    async fn resolve_credentials<'a>(
        &self,
        user_id: &str,
        candidates: &[&'a Provider],
        explicit: bool,
    ) -> Result<Vec<(&'a Provider, Option<Credential>)>, TranslateError> {
        let mut resolved = Vec::with_capacity(candidates.len());
        for &provider in candidates {
            match self.credentials.resolve(user_id, provider.id()).await {
                Ok(credential) => resolved.push((provider, Some(credential))),
                Err(CredentialError::Missing { .. }) if !explicit => resolved.push((provider, None)),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(resolved)
    }

    async fn call_provider(
        &self,
        provider: &Provider,
        key: &NormalizedKey,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        self.metrics.record_provider_call();
        let call = provider.translate(key.text(), key.source(), key.target(), credential);
        let result = match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };
        if result.is_err() {
            self.metrics.record_provider_failure();
        }
        result
    }
}

fn parse_provider(name: Option<&str>) -> Result<Option<ProviderId>, TranslateError> {
    match name.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) if name.eq_ignore_ascii_case("auto") => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(TranslateError::InvalidInput),
    }
}

fn respond(
    original_text: String,
    key: &NormalizedKey,
    translated_text: String,
    provider_used: String,
    cached: bool,
    hit_count: Option<u64>,
) -> TranslationResponse {
    TranslationResponse {
        original_text,
        translated_text,
        source_lang: key.source().code().to_string(),
        target_lang: key.target().code().to_string(),
        provider_used,
        cached,
        hit_count,
    }
}
