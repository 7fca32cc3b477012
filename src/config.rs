use crate::cache::TtlPolicy;
use crate::providers::{self, ProviderId};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // Backing services (both optional: in-process fallbacks when unset)
    pub redis_url: Option<String>,
    pub database_url: Option<String>,

    // Secrets
    pub encryption_key: String,
    pub deepl_api_key: Option<String>,
    pub hf_token: Option<String>,
    pub admin_api_key: Option<String>,

    // Provider endpoints
    pub mymemory_api_url: String,
    pub helsinki_api_url: String,
    pub deepl_api_url: String,

    // Provider selection
    pub provider_priority: Vec<ProviderId>,
    pub provider_timeout: Duration,
    pub mymemory_daily_word_quota: u32,

    // Cache
    pub cache_base_ttl_secs: u64,
    pub cache_min_ttl_secs: u64,
    pub cache_max_ttl_secs: u64,
    pub cache_op_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            port: parse_or("PORT", 8080)?,

            redis_url: optional("REDIS_URL"),
            database_url: optional("DATABASE_URL"),

            // Fernet key for stored provider secrets
            encryption_key: std::env::var("ENCRYPTION_KEY")
                .context("ENCRYPTION_KEY not set")?,
            deepl_api_key: optional("DEEPL_API_KEY"),
            hf_token: optional("HF_TOKEN"),
            admin_api_key: optional("ADMIN_API_KEY"),

            mymemory_api_url: optional("MYMEMORY_API_URL")
                .unwrap_or_else(|| providers::mymemory::DEFAULT_API_URL.to_string()),
            helsinki_api_url: optional("HELSINKI_API_URL")
                .unwrap_or_else(|| providers::helsinki::DEFAULT_API_URL.to_string()),
            deepl_api_url: optional("DEEPL_API_URL")
                .unwrap_or_else(|| providers::deepl::DEFAULT_API_URL.to_string()),

            provider_priority: match optional("PROVIDER_PRIORITY") {
                Some(list) => parse_priority(&list).context("Invalid PROVIDER_PRIORITY")?,
                None => ProviderId::ALL.to_vec(),
            },
            provider_timeout: Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 10)?),
            mymemory_daily_word_quota: parse_or("MYMEMORY_DAILY_WORD_QUOTA", 5000)?,

            cache_base_ttl_secs: parse_or("CACHE_BASE_TTL_SECS", 1800)?,
            cache_min_ttl_secs: parse_or("CACHE_MIN_TTL_SECS", 1800)?,
            cache_max_ttl_secs: parse_or("CACHE_MAX_TTL_SECS", 604_800)?,
            cache_op_timeout: Duration::from_millis(parse_or("CACHE_OP_TIMEOUT_MS", 500)?),
        };

        // Fail at startup rather than on the first cache write
        config.ttl_policy()?;
        Ok(config)
    }

    pub fn ttl_policy(&self) -> Result<TtlPolicy> {
        TtlPolicy::new(
            self.cache_base_ttl_secs,
            self.cache_min_ttl_secs,
            self.cache_max_ttl_secs,
        )
        .map_err(|e| anyhow!("Invalid cache TTL configuration: {}", e))
    }
}

/// Unset and blank variables both read as absent.
fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

/// Comma-separated provider names, most preferred first. Duplicates are dropped.
fn parse_priority(list: &str) -> Result<Vec<ProviderId>> {
    let mut priority = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id: ProviderId = name.parse().map_err(|e: String| anyhow!(e))?;
        if !priority.contains(&id) {
            priority.push(id);
        }
    }
    if priority.is_empty() {
        return Err(anyhow!("no providers listed"));
    }
    Ok(priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PORT",
        "REDIS_URL",
        "DATABASE_URL",
        "ENCRYPTION_KEY",
        "DEEPL_API_KEY",
        "HF_TOKEN",
        "ADMIN_API_KEY",
        "MYMEMORY_API_URL",
        "HELSINKI_API_URL",
        "DEEPL_API_URL",
        "PROVIDER_PRIORITY",
        "PROVIDER_TIMEOUT_SECS",
        "MYMEMORY_DAILY_WORD_QUOTA",
        "CACHE_BASE_TTL_SECS",
        "CACHE_MIN_TTL_SECS",
        "CACHE_MAX_TTL_SECS",
        "CACHE_OP_TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        std::env::set_var("ENCRYPTION_KEY", "key");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.database_url, None);
        assert_eq!(
            config.provider_priority,
            vec![ProviderId::MyMemory, ProviderId::Helsinki, ProviderId::DeepL]
        );
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_op_timeout, Duration::from_millis(500));
        assert_eq!(config.mymemory_daily_word_quota, 5000);
        assert_eq!(config.ttl_policy().unwrap(), TtlPolicy::default());
        assert_eq!(config.deepl_api_url, "https://api-free.deepl.com");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_encryption_key() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("ENCRYPTION_KEY"));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("ENCRYPTION_KEY", "key");
        std::env::set_var("PORT", "9000");
        std::env::set_var("REDIS_URL", "redis://cache:6379/0");
        std::env::set_var("DEEPL_API_KEY", "  ");
        std::env::set_var("PROVIDER_PRIORITY", "deepl, MyMemory,deepl");
        std::env::set_var("CACHE_MAX_TTL_SECS", "86400");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/0"));
        assert_eq!(config.deepl_api_key, None);
        assert_eq!(
            config.provider_priority,
            vec![ProviderId::DeepL, ProviderId::MyMemory]
        );
        assert_eq!(config.ttl_policy().unwrap().max_secs(), 86400);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_rejected() {
        clear_env();
        std::env::set_var("ENCRYPTION_KEY", "key");

        std::env::set_var("PORT", "eighty");
        assert!(Config::from_env().unwrap_err().to_string().contains("PORT"));
        std::env::remove_var("PORT");

        std::env::set_var("PROVIDER_PRIORITY", "deepl,google");
        assert!(Config::from_env().is_err());
        std::env::remove_var("PROVIDER_PRIORITY");

        std::env::set_var("CACHE_MIN_TTL_SECS", "7200");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("TTL"));

        clear_env();
    }
}
