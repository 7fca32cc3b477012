use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use translation_gateway::cache::{AdaptiveCache, CacheStore, MemoryStore, RedisStore};
use translation_gateway::config::Config;
use translation_gateway::credentials::{
    CredentialResolver, CredentialStore, MemoryCredentialStore, SecretCipher,
};
use translation_gateway::db::PgCredentialStore;
use translation_gateway::metrics::TranslationMetrics;
use translation_gateway::providers::ProviderId;
use translation_gateway::registry::ProviderRegistry;
use translation_gateway::retry::{with_retry, RetryConfig};
use translation_gateway::server::{self, AppState};
use translation_gateway::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_gateway=info".parse()?),
        )
        .init();

    info!("Starting translation gateway");

    let config = Config::from_env()?;

    // The decryption key is loaded exactly once; a bad key stops startup.
    let cipher = SecretCipher::new(&config.encryption_key)
        .ok_or_else(|| anyhow!("ENCRYPTION_KEY is not a valid Fernet key"))?;

    let metrics = Arc::new(TranslationMetrics::new());

    let store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis cache store");
            Arc::new(RedisStore::new(url, config.cache_op_timeout).context("Invalid REDIS_URL")?)
        }
        None => {
            warn!("REDIS_URL not set, using in-process cache store");
            Arc::new(MemoryStore::new())
        }
    };
    let cache = AdaptiveCache::new(store, config.ttl_policy()?, Arc::clone(&metrics));

    let credential_store: Arc<dyn CredentialStore> = match &config.database_url {
        Some(url) => {
            let store = with_retry(&RetryConfig::startup(), "Database connect", || {
                PgCredentialStore::connect(url)
            })
            .await
            .context("Failed to connect to DATABASE_URL")?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, only configured system keys are available");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let mut credentials = CredentialResolver::new(credential_store, Arc::new(cipher));
    if let Some(key) = &config.deepl_api_key {
        credentials = credentials.with_system_secret(ProviderId::DeepL, key);
    }
    if let Some(token) = &config.hf_token {
        credentials = credentials.with_system_secret(ProviderId::Helsinki, token);
    }

    let client = reqwest::Client::builder()
        .timeout(config.provider_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let registry = ProviderRegistry::from_config(&config, client);
    info!(
        "Provider priority: {}",
        registry
            .ids()
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let orchestrator = Orchestrator::new(registry, credentials, cache, metrics)
        .with_provider_timeout(config.provider_timeout);

    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY not set, stats endpoint is disabled");
    }
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        admin_api_key: config.admin_api_key.as_deref().map(Arc::from),
    };

    server::serve(state, config.port).await
}
