//! Search backend records and the hit shapes they return

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Current schema version for backend credentials and battle configs
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// One ranked hit returned by a search backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Hits plus provider-specific metadata from a single search call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SearchResponse {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, metadata: Map::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Versioned per-side configuration blob attached to a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedConfig {
    pub version: u32,
    #[serde(default = "empty_body")]
    pub body: Value,
}

fn empty_body() -> Value {
    Value::Object(Map::new())
}

impl VersionedConfig {
    pub fn new(body: Value) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            body,
        }
    }
}

impl Default for VersionedConfig {
    fn default() -> Self {
        Self::new(empty_body())
    }
}

/// A registered search backend: provider key plus serialized credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRecord {
    pub id: Uuid,
    pub label: String,
    pub provider: String,
    pub credentials: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BackendRecord {
    pub fn new(label: impl Into<String>, provider: impl Into<String>, credentials: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            provider: provider.into(),
            credentials,
            created_at: Utc::now(),
        }
    }
}
