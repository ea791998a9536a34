//! LLM judge backed by the Gemini generateContent API
//!
//! The judge sees at most ten deduplicated hits per side and must answer with
//! a JSON object holding a score and feedback for each database. When no API
//! key is configured, or when the model's answer cannot be read, both sides
//! degrade to the sentinel score instead of failing the query. Transport and
//! HTTP errors are raised.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{is_valid_score, process_debug, process_warn, JudgeUsage, ProcessId, SearchHit};

use crate::core::dedupe_for_judging;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{Evaluation, Judge, SideVerdict};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default prices in USD per million tokens
pub const DEFAULT_INPUT_COST_PER_MTOK: f64 = 0.30;
pub const DEFAULT_OUTPUT_COST_PER_MTOK: f64 = 2.50;

/// Judge connection and pricing settings
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub input_cost_per_mtok: f64,
    pub output_cost_per_mtok: f64,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            input_cost_per_mtok: DEFAULT_INPUT_COST_PER_MTOK,
            output_cost_per_mtok: DEFAULT_OUTPUT_COST_PER_MTOK,
        }
    }
}

impl JudgeSettings {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Gemini-backed judge
pub struct LlmJudge {
    client: reqwest::Client,
    settings: JudgeSettings,
}

#[derive(Debug, Deserialize)]
struct RawVerdicts {
    db1: RawVerdict,
    db2: RawVerdict,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: Value,
    #[serde(default)]
    feedback: String,
}

impl RawVerdict {
    fn into_verdict(self) -> Option<SideVerdict> {
        let score = match &self.score {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !is_valid_score(score) || self.feedback.trim().is_empty() {
            return None;
        }
        Some(SideVerdict::new(score, self.feedback))
    }
}

fn json_object_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("Result {}:\nTitle: {}\nDescription: {}\n", i + 1, hit.title, hit.description))
        .collect::<Vec<_>>()
        .join("\n")
}

impl LlmJudge {
    pub fn new(client: reqwest::Client, settings: JudgeSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether a credential is configured
    pub fn is_available(&self) -> bool {
        self.api_key().is_some()
    }

    /// Compose the comparison prompt from already prepared hit lists
    pub fn build_prompt(query: &str, hits_a: &[SearchHit], hits_b: &[SearchHit]) -> String {
        format!(
            r#"You are a search quality evaluator. Evaluate the relevance of the following search results for the query: "{query}"
There are two different databases, database 1 and database 2. Compare the results of these two databases
and assign a score to each database based on the quality of the results and their relevance to the query.

Database 1 results:
{}

Database 2 results:
{}

While evaluating, having irrelevant results is not important.
If the ordering of the results makes sense, and a user can find the things they want, that is important.

Provide your evaluation in the following JSON format only:
{{
  "db1": {{
    "score": [a number between 1.0 and 10.0, where 10 is perfect],
    "feedback": [a brief explanation of your score and assessment of the results]
  }},
  "db2": {{
    "score": [a number between 1.0 and 10.0, where 10 is perfect],
    "feedback": [a brief explanation of your score and assessment of the results]
  }}
}}"#,
            format_hits(hits_a),
            format_hits(hits_b),
        )
    }

    /// Extract both verdicts from model text; None if either side is unusable
    pub fn parse_verdicts(text: &str) -> Option<(SideVerdict, SideVerdict)> {
        let object = json_object_pattern()?.find(text)?.as_str();
        let raw: RawVerdicts = serde_json::from_str(object).ok()?;
        Some((raw.db1.into_verdict()?, raw.db2.into_verdict()?))
    }

    fn usage_from(&self, response: &Value) -> JudgeUsage {
        let metadata = response.get("usageMetadata");
        let count = |key: &str| metadata.and_then(|m| m.get(key)).and_then(Value::as_u64).unwrap_or(0);
        JudgeUsage::priced(
            count("promptTokenCount"),
            count("candidatesTokenCount"),
            self.settings.input_cost_per_mtok,
            self.settings.output_cost_per_mtok,
        )
    }
}

#[async_trait::async_trait]
impl Judge for LlmJudge {
    async fn evaluate(&self, query: &str, hits_a: &[SearchHit], hits_b: &[SearchHit]) -> OrchestratorResult<Evaluation> {
        let Some(api_key) = self.api_key() else {
            process_debug!(ProcessId::current(), "⚖️ No judge credential configured, scoring as unavailable");
            return Ok(Evaluation::unavailable(JudgeUsage::default(), 0));
        };

        let prompt = Self::build_prompt(query, &dedupe_for_judging(hits_a), &dedupe_for_judging(hits_b));
        let request_body = json!({
            "contents": [
                {
                    "parts": [
                        {
                            "text": prompt
                        }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": 0.2
            }
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(OrchestratorError::judge)?;

        if !response.status().is_success() {
            return Err(OrchestratorError::judge(format!("HTTP {}", response.status())));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::judge(format!("Failed to parse response: {e}")))?;
        let duration_ms = started.elapsed().as_millis() as u64;
        let usage = self.usage_from(&response_json);

        let text = response_json
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str())
            .unwrap_or_default();

        match Self::parse_verdicts(text) {
            Some((side_a, side_b)) => Ok(Evaluation {
                side_a,
                side_b,
                usage,
                duration_ms,
            }),
            None => {
                process_warn!(ProcessId::current(), "⚖️ Judge output unreadable for query '{}'", query);
                Ok(Evaluation::unavailable(usage, duration_ms))
            }
        }
    }
}
