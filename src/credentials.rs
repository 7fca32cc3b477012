//! Credential resolution for provider calls.
//!
//! Stored secrets are Fernet tokens. They are decrypted with the process-wide
//! [`SecretCipher`] only when a request needs them, and the plaintext lives in
//! a [`Secret`] that is dropped with the request.

use crate::providers::{CredentialPolicy, ProviderId};
use async_trait::async_trait;
use fernet::Fernet;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("stored {provider} credential could not be decrypted")]
    Decryption { provider: ProviderId },

    #[error("no {provider} credential available")]
    Missing { provider: ProviderId },

    #[error("credential store error: {0}")]
    Store(String),
}

/// Plaintext secret. Redacted in `Debug`, no `Display`.
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

/// What a provider call authenticates with.
#[derive(Debug)]
pub enum Credential {
    Anonymous,
    User(Secret),
    System(Secret),
}

impl Credential {
    pub fn secret(&self) -> Option<&str> {
        match self {
            Credential::Anonymous => None,
            Credential::User(s) | Credential::System(s) => Some(s.expose()),
        }
    }

    /// Where the credential came from, safe to log.
    pub fn source(&self) -> &'static str {
        match self {
            Credential::Anonymous => "anonymous",
            Credential::User(_) => "user",
            Credential::System(_) => "system",
        }
    }

    pub(crate) fn probe(secret: &str) -> Self {
        Credential::User(Secret::new(secret))
    }
}

/// Symmetric cipher for stored provider secrets, built once at startup.
pub struct SecretCipher {
    fernet: Fernet,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretCipher([redacted])")
    }
}

impl SecretCipher {
    /// `key` is a url-safe base64 Fernet key (32 bytes decoded).
    pub fn new(key: &str) -> Option<Self> {
        Fernet::new(key.trim()).map(|fernet| Self { fernet })
    }

    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    fn decrypt(&self, token: &str, provider: ProviderId) -> Result<Secret, CredentialError> {
        let bytes = self
            .fernet
            .decrypt(token.trim())
            .map_err(|_| CredentialError::Decryption { provider })?;
        String::from_utf8(bytes)
            .map(Secret)
            .map_err(|_| CredentialError::Decryption { provider })
    }
}

/// Read-only view of the account subsystem's stored credentials.
///
/// `owner = None` addresses the system default row for the provider.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(
        &self,
        owner: Option<&str>,
        provider: ProviderId,
    ) -> Result<Option<String>, CredentialError>;
}

/// In-process credential store for tests and deployments without a database.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<(Option<String>, ProviderId), String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already-encrypted secret.
    pub fn insert(&self, owner: Option<&str>, provider: ProviderId, encrypted_secret: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((owner.map(str::to_string), provider), encrypted_secret);
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credential(
        &self,
        owner: Option<&str>,
        provider: ProviderId,
    ) -> Result<Option<String>, CredentialError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CredentialError::Store("credential map poisoned".to_string()))?;
        Ok(entries.get(&(owner.map(str::to_string), provider)).cloned())
    }
}

/// Produces the credential for one (user, provider) pair.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<SecretCipher>,
    system_secrets: HashMap<ProviderId, String>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, cipher: Arc<SecretCipher>) -> Self {
        Self {
            store,
            cipher,
            system_secrets: HashMap::new(),
        }
    }

    /// Plaintext system default from configuration, used when no system row is stored.
    pub fn with_system_secret(mut self, provider: ProviderId, secret: impl Into<String>) -> Self {
        self.system_secrets.insert(provider, secret.into());
        self
    }

    /// Resolve in order: the user's own secret, then (for providers that
    /// require one) the system default, then anonymous where allowed.
    ///
    /// A stored secret that fails to decrypt is an error; the resolver never
    /// falls through to the system credential in that case.
    pub async fn resolve(
        &self,
        user_id: &str,
        provider: ProviderId,
    ) -> Result<Credential, CredentialError> {
        if let Some(token) = self.store.get_credential(Some(user_id), provider).await? {
            let secret = self.cipher.decrypt(&token, provider)?;
            debug!(provider = %provider, "Using user credential");
            return Ok(Credential::User(secret));
        }

        match provider.credential_policy() {
            CredentialPolicy::Required => {
                if let Some(token) = self.store.get_credential(None, provider).await? {
                    let secret = self.cipher.decrypt(&token, provider)?;
                    debug!(provider = %provider, "Using stored system credential");
                    return Ok(Credential::System(secret));
                }
                if let Some(secret) = self.system_secrets.get(&provider) {
                    debug!(provider = %provider, "Using configured system credential");
                    return Ok(Credential::System(Secret::new(secret.as_str())));
                }
                Err(CredentialError::Missing { provider })
            }
            CredentialPolicy::Optional => Ok(Credential::Anonymous),
        }
    }
}
