//! Provider registry
//!
//! Maps a provider key to a constructor. Adding a provider means registering
//! one more constructor here; the orchestrator only ever sees the
//! `SearchBackend` capability.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared::{process_debug, ProcessId, VersionedConfig};

use super::backends::{
    algolia, upstash_redis_search, upstash_search, AlgoliaBackend, UpstashRedisSearchBackend, UpstashSearchBackend,
};
use super::credentials::CredentialDocument;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{BackendFactory, SearchBackend};

/// Builds one provider's backend from validated credentials and a battle-side config
pub type BackendConstructor =
    Arc<dyn Fn(&CredentialDocument, &VersionedConfig) -> OrchestratorResult<Arc<dyn SearchBackend>> + Send + Sync>;

/// Registry of search providers keyed by provider name
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider sharing one HTTP client
    pub fn with_defaults(client: reqwest::Client) -> Self {
        let upstash_client = client.clone();
        let redis_client = client.clone();
        let algolia_client = client;

        Self::new()
            .register(upstash_search::PROVIDER, move |credentials, config| {
                let backend = UpstashSearchBackend::from_parts(upstash_client.clone(), credentials, config)?;
                Ok(Arc::new(backend) as Arc<dyn SearchBackend>)
            })
            .register(upstash_redis_search::PROVIDER, move |credentials, config| {
                let backend = UpstashRedisSearchBackend::from_parts(redis_client.clone(), credentials, config)?;
                Ok(Arc::new(backend) as Arc<dyn SearchBackend>)
            })
            .register(algolia::PROVIDER, move |credentials, config| {
                let backend = AlgoliaBackend::from_parts(algolia_client.clone(), credentials, config)?;
                Ok(Arc::new(backend) as Arc<dyn SearchBackend>)
            })
    }

    /// Add or replace a provider
    pub fn register<C>(mut self, provider: impl Into<String>, constructor: C) -> Self
    where
        C: Fn(&CredentialDocument, &VersionedConfig) -> OrchestratorResult<Arc<dyn SearchBackend>> + Send + Sync + 'static,
    {
        self.constructors.insert(provider.into(), Arc::new(constructor));
        self
    }

    /// Registered provider keys in sorted order
    pub fn providers(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl BackendFactory for BackendRegistry {
    fn supports(&self, provider: &str) -> bool {
        self.constructors.contains_key(provider)
    }

    fn create(
        &self,
        provider: &str,
        credentials: &CredentialDocument,
        config: &VersionedConfig,
    ) -> OrchestratorResult<Arc<dyn SearchBackend>> {
        let constructor = self
            .constructors
            .get(provider)
            .ok_or_else(|| OrchestratorError::UnknownProvider {
                provider: provider.to_string(),
            })?;

        process_debug!(ProcessId::current(), "🔌 Building {} backend", provider);
        constructor(credentials, config)
    }
}
