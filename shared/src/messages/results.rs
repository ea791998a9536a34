//! Per-query result views

use crate::types::{ResultRecord, SearchHit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Mean, population standard deviation and count of valid scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// One side of one rating attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub config_index: u8,
    pub rating_index: u32,
    pub hits: Vec<SearchHit>,
    pub score: f64,
    pub feedback: String,
    pub search_duration_ms: u64,
    pub judge_duration_ms: u64,
    pub metadata: Value,
}

impl From<&ResultRecord> for AttemptView {
    fn from(record: &ResultRecord) -> Self {
        Self {
            config_index: record.config_index,
            rating_index: record.rating_index,
            hits: record.hits.clone(),
            score: record.score,
            feedback: record.feedback.clone(),
            search_duration_ms: record.search_duration_ms,
            judge_duration_ms: record.judge_duration_ms,
            metadata: record.metadata.clone(),
        }
    }
}

/// A query with all of its rating attempts and per-side summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryView {
    pub query_id: Uuid,
    pub query_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub per_attempt: Vec<AttemptView>,
    pub summary1: ScoreSummary,
    pub summary2: ScoreSummary,
}
