//! Upstash Redis Search: keyword search with fuzzy title matching and a description phrase filter

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{SearchHit, SearchResponse, VersionedConfig};
use url::Url;

use super::{invalid_config, non_blank, parse_config, NO_DESCRIPTION, UNTITLED};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::credentials::CredentialDocument;
use crate::traits::SearchBackend;

pub const PROVIDER: &str = "upstash_redis_search";

const QUERY_COMMAND: &str = "SEARCH.QUERY";

/// Edit distance allowed when matching the title
const FUZZY_DISTANCE: u32 = 3;

/// Weight of a title match relative to a description match
const TITLE_BOOST: u32 = 2;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstashRedisSearchCredentials {
    pub url: String,
    pub token: String,
    pub default_index: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpstashRedisSearchConfig {
    #[serde(default)]
    pub index: Option<String>,
}

/// REST reply: `result` on success, `error` otherwise
#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Option<Vec<RedisHit>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedisHit {
    key: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    data: Option<Value>,
}

impl RedisHit {
    fn data_field(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }

    fn into_hit(self) -> SearchHit {
        let title = self.data_field("title").unwrap_or(UNTITLED).to_string();
        let description = self.data_field("description").unwrap_or(NO_DESCRIPTION).to_string();
        SearchHit {
            id: self.key,
            title,
            description,
            score: Some(self.score.unwrap_or(0.0)),
        }
    }
}

/// Upstash Redis REST client bound to one search index
pub struct UpstashRedisSearchBackend {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    index: String,
}

impl UpstashRedisSearchBackend {
    pub fn from_parts(
        client: reqwest::Client,
        credentials: &CredentialDocument,
        config: &VersionedConfig,
    ) -> OrchestratorResult<Self> {
        let credentials: UpstashRedisSearchCredentials = credentials.parse_as(PROVIDER)?;
        let config: UpstashRedisSearchConfig = parse_config(PROVIDER, config)?;

        let index = non_blank(config.index.as_deref())
            .or_else(|| non_blank(Some(&credentials.default_index)))
            .ok_or_else(|| invalid_config(PROVIDER, "no index in config and no defaultIndex in credentials"))?;

        let endpoint = Url::parse(&credentials.url).map_err(|e| OrchestratorError::InvalidCredentials {
            provider: PROVIDER.to_string(),
            message: format!("url: {e}"),
        })?;

        Ok(Self {
            client,
            endpoint,
            token: credentials.token,
            index,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Fuzzy boosted match on the title, phrase match on the description
    fn filter(query: &str) -> Value {
        json!({
            "title": {
                "$fuzzy": { "value": query, "distance": FUZZY_DISTANCE },
                "$boost": TITLE_BOOST,
            },
            "description": { "$phrase": query },
        })
    }

    fn command(&self, query: &str) -> Value {
        json!([QUERY_COMMAND, self.index, Self::filter(query).to_string()])
    }
}

#[async_trait::async_trait]
impl SearchBackend for UpstashRedisSearchBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&self.command(query))
            .send()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OrchestratorError::search(PROVIDER, e))?;
        let reply: Option<CommandReply> = serde_json::from_str(&body).ok();

        if let Some(message) = reply.as_ref().and_then(|r| r.error.as_deref()) {
            return Err(OrchestratorError::search(PROVIDER, message));
        }
        if !status.is_success() {
            return Err(OrchestratorError::search(
                PROVIDER,
                format!("HTTP error! status: {}", status.as_u16()),
            ));
        }

        let hits: Vec<SearchHit> = reply
            .ok_or_else(|| OrchestratorError::search(PROVIDER, "Failed to parse response"))?
            .result
            .unwrap_or_default()
            .into_iter()
            .map(RedisHit::into_hit)
            .collect();

        let total = hits.len();
        Ok(SearchResponse::new(hits)
            .with_metadata("totalResults", json!(total))
            .with_metadata("indexName", json!(self.index)))
    }
}
