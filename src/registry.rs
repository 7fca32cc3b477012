//! Provider registry: which adapters exist and in what order to try them.

use crate::config::Config;
use crate::error::{ProviderFailure, TranslateError};
use crate::languages::Language;
use crate::providers::{
    DailyQuota, DeepL, Helsinki, MyMemory, Provider, ProviderErrorKind, ProviderId,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Provider>,
    priority: Vec<ProviderId>,
}

impl ProviderRegistry {
    /// Empty registry trying providers in `priority` order.
    pub fn new(priority: Vec<ProviderId>) -> Self {
        Self {
            providers: HashMap::new(),
            priority,
        }
    }

    /// Build the adapters named in `PROVIDER_PRIORITY`, sharing one HTTP
    /// client. Providers left out of the list are not registered at all.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let mut registry = Self::new(config.provider_priority.clone());
        for &id in &config.provider_priority {
            let provider = match id {
                ProviderId::MyMemory => Provider::MyMemory(
                    MyMemory::new(client.clone(), &config.mymemory_api_url).with_quota(Arc::new(
                        DailyQuota::new(config.mymemory_daily_word_quota),
                    )),
                ),
                ProviderId::Helsinki => {
                    Provider::Helsinki(Helsinki::new(client.clone(), &config.helsinki_api_url))
                }
                ProviderId::DeepL => {
                    Provider::DeepL(DeepL::new(client.clone(), &config.deepl_api_url))
                }
            };
            registry.register(provider);
        }
        registry
    }

    /// Add or replace an adapter. Ids missing from the priority list go last.
    pub fn register(&mut self, provider: Provider) {
        let id = provider.id();
        if !self.priority.contains(&id) {
            self.priority.push(id);
        }
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.get(&id)
    }

    /// Registered provider ids in priority order.
    pub fn ids(&self) -> Vec<ProviderId> {
        self.priority
            .iter()
            .copied()
            .filter(|id| self.providers.contains_key(id))
            .collect()
    }

    /// Ordered candidates for a request.
    ///
    /// An explicit provider is the only candidate and must support the pair.
    /// Otherwise every registered provider supporting the pair, in priority
    /// order.
    pub fn candidates(
        &self,
        explicit: Option<ProviderId>,
        source: Language,
        target: Language,
    ) -> Result<Vec<&Provider>, TranslateError> {
        if let Some(id) = explicit {
            return match self.providers.get(&id) {
                Some(provider) if provider.supports_pair(source, target) => Ok(vec![provider]),
                Some(_) => Err(unavailable(vec![(id, ProviderErrorKind::UnsupportedPair)])),
                None => Err(unavailable(vec![(id, ProviderErrorKind::Unavailable)])),
            };
        }

        let candidates: Vec<&Provider> = self
            .ids()
            .into_iter()
            .filter_map(|id| self.providers.get(&id))
            .filter(|p| p.supports_pair(source, target))
            .collect();

        if candidates.is_empty() {
            let failures = self
                .ids()
                .into_iter()
                .map(|id| (id, ProviderErrorKind::UnsupportedPair))
                .collect();
            return Err(unavailable(failures));
        }
        Ok(candidates)
    }
}

fn unavailable(failures: Vec<(ProviderId, ProviderErrorKind)>) -> TranslateError {
    TranslateError::ProviderUnavailable {
        failures: failures
            .into_iter()
            .map(|(provider, kind)| ProviderFailure { provider, kind })
            .collect(),
    }
}
