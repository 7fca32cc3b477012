//! Redis-backed cache store.
//!
//! Each entry is a hash. A hit runs one Lua script so the increment, the TTL
//! recomputation and the expiry extension happen as a single atomic step on
//! the server. Writes go through a MULTI/EXEC pipeline.

use super::{CacheEntry, CacheError, CacheStore, TtlPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const FIELD_TEXT: &str = "text";
const FIELD_PROVIDER: &str = "provider";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_LAST_ACCESSED_AT: &str = "last_accessed_at";
const FIELD_HIT_COUNT: &str = "hit_count";
const FIELD_TTL: &str = "ttl";

/// ARGV: base, min, max (seconds), access timestamp. Mirrors `TtlPolicy::ttl_for`.
const HIT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return false
end
local hits = redis.call('HINCRBY', KEYS[1], 'hit_count', 1)
local ttl = math.floor(tonumber(ARGV[1]) * math.sqrt(hits))
local min_ttl = tonumber(ARGV[2])
local max_ttl = tonumber(ARGV[3])
if ttl < min_ttl then ttl = min_ttl end
if ttl > max_ttl then ttl = max_ttl end
redis.call('HSET', KEYS[1], 'ttl', ttl, 'last_accessed_at', ARGV[4])
redis.call('EXPIRE', KEYS[1], ttl)
return redis.call('HGETALL', KEYS[1])
"#;

#[derive(Clone)]
pub struct RedisStore {
    client: Arc<Client>,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    hit_script: Arc<Script>,
    op_timeout: Duration,
}

impl Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = match self.connection.try_read() {
            Ok(conn) if conn.is_some() => "connected",
            Ok(_) => "no_connection",
            Err(_) => "lock_busy",
        };
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisStore {
    /// Parse the URL; no connection is made until the first operation.
    pub fn new(redis_url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            connection: Arc::new(RwLock::new(None)),
            hit_script: Arc::new(Script::new(HIT_SCRIPT)),
            op_timeout,
        })
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.connection.write().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Bound `op` by the per-operation timeout. Any failure drops the cached
    /// connection so the next call reconnects.
    async fn guarded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let result = match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };
        if result.is_err() {
            *self.connection.write().await = None;
        }
        result
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn hit(
        &self,
        key: &str,
        policy: &TtlPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let raw: Option<HashMap<String, String>> = self
            .guarded(async {
                let mut conn = self.get_connection().await?;
                let raw: Option<HashMap<String, String>> = self
                    .hit_script
                    .key(key)
                    .arg(policy.base_secs())
                    .arg(policy.min_secs())
                    .arg(policy.max_secs())
                    .arg(now.to_rfc3339())
                    .invoke_async(&mut conn)
                    .await?;
                Ok::<_, CacheError>(raw)
            })
            .await?;

        raw.map(|fields| entry_from_fields(key, &fields)).transpose()
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let fields = entry_to_fields(entry);
        let ttl = i64::try_from(entry.current_ttl).unwrap_or(i64::MAX);
        self.guarded(async {
            let mut conn = self.get_connection().await?;
            let _: () = redis::pipe()
                .atomic()
                .del(&entry.key)
                .ignore()
                .hset_multiple(&entry.key, &fields)
                .ignore()
                .expire(&entry.key, ttl)
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn key_count(&self) -> Result<u64, CacheError> {
        self.guarded(async {
            let mut conn = self.get_connection().await?;
            let count: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
            Ok::<_, CacheError>(count)
        })
        .await
    }
}

fn entry_to_fields(entry: &CacheEntry) -> Vec<(&'static str, String)> {
    vec![
        (FIELD_TEXT, entry.translated_text.clone()),
        (FIELD_PROVIDER, entry.provider_used.clone()),
        (FIELD_CREATED_AT, entry.created_at.to_rfc3339()),
        (FIELD_LAST_ACCESSED_AT, entry.last_accessed_at.to_rfc3339()),
        (FIELD_HIT_COUNT, entry.hit_count.to_string()),
        (FIELD_TTL, entry.current_ttl.to_string()),
    ]
}

fn entry_from_fields(key: &str, fields: &HashMap<String, String>) -> Result<CacheEntry, CacheError> {
    let corrupt = |reason: String| CacheError::Corrupt {
        key: key.to_string(),
        reason,
    };
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| corrupt(format!("missing field '{}'", name)))
    };
    let timestamp = |name: &str| -> Result<DateTime<Utc>, CacheError> {
        DateTime::parse_from_rfc3339(field(name)?)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad {}: {}", name, e)))
    };
    let number = |name: &str| -> Result<u64, CacheError> {
        field(name)?
            .parse::<u64>()
            .map_err(|e| corrupt(format!("bad {}: {}", name, e)))
    };

    Ok(CacheEntry {
        key: key.to_string(),
        translated_text: field(FIELD_TEXT)?.clone(),
        provider_used: field(FIELD_PROVIDER)?.clone(),
        created_at: timestamp(FIELD_CREATED_AT)?,
        last_accessed_at: timestamp(FIELD_LAST_ACCESSED_AT)?,
        hit_count: number(FIELD_HIT_COUNT)?,
        current_ttl: number(FIELD_TTL)?,
    })
}
