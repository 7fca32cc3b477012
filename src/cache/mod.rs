//! Adaptive translation cache.
//!
//! Entries live in an external key-value store and expire there. Every hit
//! bumps the entry's popularity and stretches its lifetime according to
//! [`TtlPolicy`]. The store may disappear at any time: lookups then report
//! [`CacheLookup::Unavailable`] and writes are skipped, never failing the
//! request.

mod memory;
mod policy;
mod redis_store;

pub use memory::MemoryStore;
pub use policy::{TtlPolicy, MAX_TTL_SECS};
pub use redis_store::RedisStore;

use crate::metrics::TranslationMetrics;
use crate::providers::ProviderId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache operation timed out")]
    Timeout,

    #[error("corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// A cached translation and its popularity bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub translated_text: String,
    pub provider_used: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub hit_count: u64,
    /// Lifetime granted by the most recent write or hit, in seconds
    pub current_ttl: u64,
}

impl CacheEntry {
    pub fn new(
        key: &str,
        translated_text: &str,
        provider: ProviderId,
        policy: &TtlPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.to_string(),
            translated_text: translated_text.to_string(),
            provider_used: provider.as_str().to_string(),
            created_at: now,
            last_accessed_at: now,
            hit_count: 1,
            current_ttl: policy.ttl_for(1),
        }
    }
}

/// Backing key-value store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Record one hit as a single atomic operation: increment `hit_count`,
    /// recompute the TTL with `policy`, extend the expiry, and return the
    /// updated entry. `None` when the key is absent or expired.
    async fn hit(
        &self,
        key: &str,
        policy: &TtlPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Write `entry`, expiring after `entry.current_ttl` seconds.
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Number of live keys, if the store can count them.
    async fn key_count(&self) -> Result<u64, CacheError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    /// The store could not be reached; callers continue as on a miss.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    Skipped,
}

/// Cache statistics for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub hit_rate: f64,
    pub degraded_events: usize,
    pub total_keys: Option<u64>,
}

pub struct AdaptiveCache {
    store: Arc<dyn CacheStore>,
    policy: TtlPolicy,
    metrics: Arc<TranslationMetrics>,
}

impl AdaptiveCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        policy: TtlPolicy,
        metrics: Arc<TranslationMetrics>,
    ) -> Self {
        Self {
            store,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Look up `key`, recording a hit on success.
    pub async fn lookup(&self, key: &str) -> CacheLookup {
        match self.store.hit(key, &self.policy, Utc::now()).await {
            Ok(Some(entry)) => {
                self.metrics.record_cache_hit();
                debug!(
                    key = %key,
                    hit_count = entry.hit_count,
                    ttl = entry.current_ttl,
                    "Cache hit"
                );
                CacheLookup::Hit(entry)
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
                CacheLookup::Miss
            }
            Err(e) => {
                self.metrics.record_cache_degraded();
                warn!("Cache lookup degraded, continuing uncached: {}", e);
                CacheLookup::Unavailable
            }
        }
    }

    /// `Option` view of [`AdaptiveCache::lookup`]: unavailable reads as absent.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.lookup(key).await {
            CacheLookup::Hit(entry) => Some(entry),
            CacheLookup::Miss | CacheLookup::Unavailable => None,
        }
    }

    /// Store a fresh translation with `hit_count = 1` and the base TTL.
    pub async fn put(&self, key: &str, translated_text: &str, provider: ProviderId) -> CacheWrite {
        let entry = CacheEntry::new(key, translated_text, provider, &self.policy, Utc::now());
        match self.store.insert(&entry).await {
            Ok(()) => {
                debug!(key = %key, ttl = entry.current_ttl, "Cached translation");
                CacheWrite::Stored
            }
            Err(e) => {
                self.metrics.record_cache_degraded();
                warn!("Cache write skipped: {}", e);
                CacheWrite::Skipped
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let report = self.metrics.report();
        let total_keys = match self.store.key_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not count cache keys: {}", e);
                None
            }
        };
        CacheStats {
            cache_hits: report.cache_hits,
            cache_misses: report.cache_misses,
            hit_rate: report.cache_hit_rate,
            degraded_events: report.cache_degraded,
            total_keys,
        }
    }
}
