//! Translation metrics and observability.
//!
//! Counters are plain atomics shared through an `Arc`; contention is limited
//! to relaxed increments.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Lookups answered from the cache
    cache_hits: AtomicUsize,

    /// Lookups that found nothing
    cache_misses: AtomicUsize,

    /// Cache operations that failed because the backing store was unreachable
    cache_degraded: AtomicUsize,

    /// Network calls made to providers
    provider_calls: AtomicUsize,

    /// Provider calls that returned an error
    provider_failures: AtomicUsize,

    /// Requests answered without translation because source == target
    identity_requests: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_degraded(&self) {
        self.cache_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identity(&self) {
        self.identity_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_degraded(&self) -> usize {
        self.cache_degraded.load(Ordering::Relaxed)
    }

    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> usize {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn identity_requests(&self) -> usize {
        self.identity_requests.load(Ordering::Relaxed)
    }

    /// Snapshot of every counter plus derived rates.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.provider_calls();
        let failures = self.provider_failures();
        let provider_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            cache_degraded: self.cache_degraded(),
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
            identity_requests: self.identity_requests(),
        }
    }
}

/// Point-in-time metrics, as served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Percentage (0-100) of lookups served from cache
    pub cache_hit_rate: f64,

    pub cache_degraded: usize,
    pub provider_calls: usize,
    pub provider_failures: usize,

    /// Percentage (0-100) of provider calls that succeeded
    pub provider_success_rate: f64,

    pub identity_requests: usize,
}
