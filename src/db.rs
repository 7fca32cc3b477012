//! Read-only access to provider secrets stored by the account subsystem.
//!
//! Expected schema (owned and migrated elsewhere):
//!
//! ```sql
//! CREATE TABLE user_api_keys (
//!     id SERIAL PRIMARY KEY,
//!     user_id INTEGER REFERENCES users(id),  -- NULL for the system default
//!     provider VARCHAR(50) NOT NULL,
//!     encrypted_api_key VARCHAR(500) NOT NULL,
//!     is_active BOOLEAN DEFAULT TRUE,
//!     created_at TIMESTAMP,
//!     last_used TIMESTAMP
//! );
//! ```

use crate::credentials::{CredentialError, CredentialStore};
use crate::providers::ProviderId;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

const USER_KEY_QUERY: &str = "SELECT encrypted_api_key FROM user_api_keys \
     WHERE CAST(user_id AS TEXT) = $1 AND LOWER(provider) = $2 AND is_active = TRUE \
     ORDER BY id DESC LIMIT 1";

const SYSTEM_KEY_QUERY: &str = "SELECT encrypted_api_key FROM user_api_keys \
     WHERE user_id IS NULL AND LOWER(provider) = $1 AND is_active = TRUE \
     ORDER BY id DESC LIMIT 1";

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Open a pool and check it with a round trip.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.health_check().await?;
        info!("Connected to credential database");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_credential(
        &self,
        owner: Option<&str>,
        provider: ProviderId,
    ) -> Result<Option<String>, CredentialError> {
        let result = match owner {
            Some(user_id) => {
                sqlx::query_scalar::<_, String>(USER_KEY_QUERY)
                    .bind(user_id)
                    .bind(provider.as_str())
                    .fetch_optional(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, String>(SYSTEM_KEY_QUERY)
                    .bind(provider.as_str())
                    .fetch_optional(&self.pool)
                    .await
            }
        };

        let row = result.map_err(|e| CredentialError::Store(e.to_string()))?;
        debug!(
            provider = %provider,
            system = owner.is_none(),
            found = row.is_some(),
            "Credential lookup"
        );
        Ok(row)
    }
}
