//! Algolia: inverted-index full-text search with pagination

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared::{SearchHit, SearchResponse, VersionedConfig};
use url::Url;

use super::{invalid_config, non_blank, parse_config, NO_DESCRIPTION, UNTITLED};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::credentials::CredentialDocument;
use crate::traits::SearchBackend;

pub const PROVIDER: &str = "algolia";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoliaCredentials {
    pub application_id: String,
    pub api_key: String,
    pub default_index: String,
}

fn default_hits_per_page() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlgoliaConfig {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default = "default_hits_per_page")]
    pub hits_per_page: u32,
    #[serde(default)]
    pub page: u32,
}

impl AlgoliaConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if !(1..=500).contains(&self.hits_per_page) {
            return Err(invalid_config(
                PROVIDER,
                format!("hitsPerPage must be between 1 and 500, got {}", self.hits_per_page),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiQueryResponse {
    #[serde(default)]
    results: Vec<IndexResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexResult {
    #[serde(default)]
    hits: Vec<Map<String, Value>>,
    #[serde(default, rename = "processingTimeMS")]
    processing_time_ms: Option<u64>,
    #[serde(default)]
    nb_hits: Option<u64>,
}

fn string_field<'a>(hit: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    hit.get(key).and_then(Value::as_str)
}

fn to_hit(hit: &Map<String, Value>) -> SearchHit {
    let id = string_field(hit, "objectID")
        .map(str::to_string)
        .or_else(|| hit.get("id").map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
        .unwrap_or_else(|| "unknown".to_string());
    let title = string_field(hit, "title").unwrap_or(UNTITLED);
    let description = ["overview", "description", "content"]
        .iter()
        .find_map(|key| string_field(hit, key))
        .unwrap_or(NO_DESCRIPTION);
    SearchHit::new(id, title, description)
}

/// Algolia client bound to one battle-side config
pub struct AlgoliaBackend {
    client: reqwest::Client,
    base_url: Url,
    application_id: String,
    api_key: String,
    index: String,
    config: AlgoliaConfig,
}

impl AlgoliaBackend {
    pub fn from_parts(
        client: reqwest::Client,
        credentials: &CredentialDocument,
        config: &VersionedConfig,
    ) -> OrchestratorResult<Self> {
        let credentials: AlgoliaCredentials = credentials.parse_as(PROVIDER)?;
        let config: AlgoliaConfig = parse_config(PROVIDER, config)?;
        config.validate()?;

        let index = non_blank(config.index.as_deref())
            .or_else(|| non_blank(Some(&credentials.default_index)))
            .ok_or_else(|| invalid_config(PROVIDER, "no index in config and no defaultIndex in credentials"))?;

        let base_url = Url::parse(&format!("https://{}-dsn.algolia.net", credentials.application_id)).map_err(|e| {
            OrchestratorError::InvalidCredentials {
                provider: PROVIDER.to_string(),
                message: format!("applicationId: {e}"),
            }
        })?;

        Ok(Self {
            client,
            base_url,
            application_id: credentials.application_id,
            api_key: credentials.api_key,
            index,
            config,
        })
    }

    /// Point the client at a different host
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn queries_url(&self) -> OrchestratorResult<Url> {
        self.base_url
            .join("/1/indexes/*/queries")
            .map_err(|e| OrchestratorError::search(PROVIDER, e))
    }
}

#[async_trait::async_trait]
impl SearchBackend for AlgoliaBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse> {
        let body = json!({
            "requests": [{
                "indexName": self.index,
                "query": query,
                "hitsPerPage": self.config.hits_per_page,
                "page": self.config.page,
            }]
        });

        let response = self
            .client
            .post(self.queries_url()?)
            .header("X-Algolia-Application-Id", &self.application_id)
            .header("X-Algolia-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::search(
                PROVIDER,
                format!("HTTP error! status: {}", response.status().as_u16()),
            ));
        }

        let parsed: MultiQueryResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, format!("Failed to parse response: {e}")))?;

        let first = parsed.results.into_iter().next();
        let (hits, processing_time, nb_hits) = match first {
            Some(result) => (
                result.hits.iter().map(to_hit).collect::<Vec<_>>(),
                result.processing_time_ms,
                result.nb_hits,
            ),
            None => (Vec::new(), None, None),
        };

        let total = hits.len();
        Ok(SearchResponse::new(hits)
            .with_metadata("totalResults", json!(total))
            .with_metadata("processingTime", json!(processing_time))
            .with_metadata("nbHits", json!(nb_hits))
            .with_metadata("index", json!(self.index))
            .with_metadata("page", json!(self.config.page)))
    }
}
