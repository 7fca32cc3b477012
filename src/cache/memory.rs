//! In-process cache store.

use super::{CacheEntry, CacheError, CacheStore, TtlPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Expired slots are swept once every this many inserts.
const PURGE_EVERY: u64 = 256;

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

/// `DashMap`-backed store. A hit mutates the entry under its shard's write
/// guard, so concurrent hits on one key are serialized and none is lost.
///
/// Keys that are never looked up again are swept on the write path, so the
/// map holds at most `PURGE_EVERY` expired slots beyond the live ones.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    inserts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, slot| slot.expires_at > now);
    }
}

fn expiry(from: Instant, ttl_secs: u64) -> Instant {
    from.checked_add(Duration::from_secs(ttl_secs))
        .or_else(|| from.checked_add(Duration::from_secs(super::policy::MAX_TTL_SECS)))
        .unwrap_or(from)
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn hit(
        &self,
        key: &str,
        policy: &TtlPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let instant = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut slot) if slot.expires_at > instant => {
                slot.entry.hit_count += 1;
                let ttl = policy.ttl_for(slot.entry.hit_count);
                slot.entry.current_ttl = ttl;
                slot.entry.last_accessed_at = now;
                slot.expires_at = expiry(instant, ttl);
                Ok(Some(slot.entry.clone()))
            }
            Some(slot) => {
                drop(slot);
                self.entries.remove_if(key, |_, slot| slot.expires_at <= instant);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(
            entry.key.clone(),
            Slot {
                entry: entry.clone(),
                expires_at: expiry(Instant::now(), entry.current_ttl),
            },
        );
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn key_count(&self) -> Result<u64, CacheError> {
        self.purge_expired();
        Ok(self.entries.len() as u64)
    }
}
