//! Search provider implementations
//!
//! Each provider owns its credential and config schema. Configs are checked
//! against the current schema version, deserialized strictly and range
//! validated before a backend instance exists.

pub mod algolia;
pub mod upstash_redis_search;
pub mod upstash_search;

pub use algolia::{AlgoliaBackend, AlgoliaConfig, AlgoliaCredentials};
pub use upstash_redis_search::{
    UpstashRedisSearchBackend, UpstashRedisSearchConfig, UpstashRedisSearchCredentials,
};
pub use upstash_search::{UpstashSearchBackend, UpstashSearchConfig, UpstashSearchCredentials};

use serde::de::DeserializeOwned;
use shared::{VersionedConfig, CURRENT_SCHEMA_VERSION};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Placeholder title for hits that carry none
pub(crate) const UNTITLED: &str = "Untitled";

/// Placeholder description for hits that carry none
pub(crate) const NO_DESCRIPTION: &str = "No description available";

/// Check the version and deserialize a battle-side config into a provider schema
pub(crate) fn parse_config<T: DeserializeOwned>(provider: &str, config: &VersionedConfig) -> OrchestratorResult<T> {
    if config.version != CURRENT_SCHEMA_VERSION {
        return Err(OrchestratorError::UnsupportedConfigVersion {
            provider: provider.to_string(),
            version: config.version,
        });
    }
    serde_json::from_value(config.body.clone()).map_err(|e| OrchestratorError::InvalidConfig {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn invalid_config(provider: &str, message: impl Into<String>) -> OrchestratorError {
    OrchestratorError::InvalidConfig {
        provider: provider.to_string(),
        message: message.into(),
    }
}

/// Non-empty trimmed string or None
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
