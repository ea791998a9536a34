//! Upstash Search: semantic search with optional reranking and input enrichment

use serde::{Deserialize, Serialize};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use shared::{SearchHit, SearchResponse, VersionedConfig};
use url::Url;

use super::{invalid_config, non_blank, parse_config, NO_DESCRIPTION, UNTITLED};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::credentials::CredentialDocument;
use crate::traits::SearchBackend;

pub const PROVIDER: &str = "upstash_search";

const ENRICHED_INPUT_HEADER: &str = "Upstash-Vector-Enriched-Input";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstashSearchCredentials {
    pub url: String,
    pub token: String,
    #[serde(default)]
    pub default_namespace: Option<String>,
}

fn default_top_k() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_semantic_weight() -> f64 {
    0.75
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpstashSearchConfig {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_true")]
    pub reranking: bool,
    #[serde(default = "default_true")]
    pub input_enrichment: bool,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
}

impl UpstashSearchConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if !(1..=500).contains(&self.top_k) {
            return Err(invalid_config(PROVIDER, format!("topK must be between 1 and 500, got {}", self.top_k)));
        }
        if !(0.0..=1.0).contains(&self.semantic_weight) {
            return Err(invalid_config(
                PROVIDER,
                format!("semanticWeight must be between 0 and 1, got {}", self.semantic_weight),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: Vec<UpstashHit>,
}

#[derive(Debug, Deserialize)]
struct UpstashHit {
    id: String,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    score: Option<f64>,
}

impl UpstashHit {
    fn content_field(&self, key: &str) -> Option<&str> {
        self.content.as_ref()?.get(key)?.as_str()
    }

    fn into_hit(self) -> SearchHit {
        let title = self.content_field("title").unwrap_or(UNTITLED).to_string();
        let description = self.content_field("description").unwrap_or(NO_DESCRIPTION).to_string();
        SearchHit {
            id: self.id,
            title,
            description,
            score: Some(self.score.unwrap_or(0.0)),
        }
    }
}

/// Upstash Search client bound to one battle-side config
pub struct UpstashSearchBackend {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    namespace: String,
    config: UpstashSearchConfig,
}

impl UpstashSearchBackend {
    /// Validate credentials and config and build the search endpoint
    pub fn from_parts(
        client: reqwest::Client,
        credentials: &CredentialDocument,
        config: &VersionedConfig,
    ) -> OrchestratorResult<Self> {
        let credentials: UpstashSearchCredentials = credentials.parse_as(PROVIDER)?;
        let config: UpstashSearchConfig = parse_config(PROVIDER, config)?;
        config.validate()?;

        let namespace = non_blank(config.namespace.as_deref())
            .or_else(|| non_blank(credentials.default_namespace.as_deref()))
            .unwrap_or_default();

        let base = Url::parse(credentials.url.trim_end_matches('/')).map_err(|e| OrchestratorError::InvalidCredentials {
            provider: PROVIDER.to_string(),
            message: format!("url: {e}"),
        })?;
        let endpoint = Url::parse(&format!("{}/search/{}", base.as_str().trim_end_matches('/'), namespace))
            .map_err(|e| invalid_config(PROVIDER, format!("namespace: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token: credentials.token,
            namespace,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_body(&self, query: &str) -> Value {
        json!({
            "query": query,
            "topK": self.config.top_k,
            "includeMetadata": true,
            "reranking": self.config.reranking,
            "inputEnrichment": self.config.input_enrichment,
            "semanticWeight": self.config.semantic_weight,
            "_returnEnrichedInput": true,
            "_appendOriginalInputToEnrichmentResult": true,
        })
    }
}

/// The enriched input arrives percent-encoded; undecodable values are kept as sent
fn decode_header_value(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[async_trait::async_trait]
impl SearchBackend for UpstashSearchBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::search(
                PROVIDER,
                format!("HTTP error! status: {}", response.status().as_u16()),
            ));
        }

        let enriched_input = response
            .headers()
            .get(ENRICHED_INPUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(decode_header_value);

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, format!("Failed to parse response: {e}")))?;

        let total = envelope.result.len();
        let hits = envelope.result.into_iter().map(UpstashHit::into_hit).collect();

        Ok(SearchResponse::new(hits)
            .with_metadata("enrichedInput", enriched_input.map(Value::String).unwrap_or(Value::Null))
            .with_metadata("totalResults", json!(total))
            .with_metadata("topK", json!(self.config.top_k))
            .with_metadata("reranking", json!(self.config.reranking))
            .with_metadata("inputEnrichment", json!(self.config.input_enrichment))
            .with_metadata("semanticWeight", json!(self.config.semantic_weight))
            .with_metadata("namespace", json!(self.namespace)))
    }
}
