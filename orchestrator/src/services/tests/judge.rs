//! Tests for the LLM judge

use serde_json::json;
use shared::{SearchHit, SENTINEL_SCORE};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::error::OrchestratorError;
use crate::services::{JudgeSettings, LlmJudge};
use crate::traits::Judge;

fn hits(titles: &[&str]) -> Vec<SearchHit> {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| SearchHit::new(i.to_string(), *title, format!("About {title}")))
        .collect()
}

fn judge_for(server: &MockServer) -> LlmJudge {
    let settings = JudgeSettings::default()
        .with_api_key("test-key")
        .with_base_url(server.uri());
    LlmJudge::new(reqwest::Client::new(), settings)
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }],
        "usageMetadata": { "promptTokenCount": 1_000_000, "candidatesTokenCount": 200_000 }
    })
}

#[test]
fn test_parse_verdicts_reads_fenced_json() {
    let text = "Here you go:\n```json\n{\"db1\": {\"score\": 7.5, \"feedback\": \"good\"}, \"db2\": {\"score\": \"4\", \"feedback\": \"weak\"}}\n```";

    let (a, b) = LlmJudge::parse_verdicts(text).unwrap();

    assert_eq!(a.score, 7.5);
    assert_eq!(a.feedback, "good");
    assert_eq!(b.score, 4.0);
}

#[test]
fn test_parse_verdicts_rejects_unusable_sides() {
    let cases = [
        "no json at all",
        r#"{"db1": {"score": 11, "feedback": "x"}, "db2": {"score": 5, "feedback": "y"}}"#,
        r#"{"db1": {"score": 5, "feedback": ""}, "db2": {"score": 5, "feedback": "y"}}"#,
        r#"{"db1": {"score": "high", "feedback": "x"}, "db2": {"score": 5, "feedback": "y"}}"#,
        r#"{"db1": {"score": 5, "feedback": "x"}}"#,
    ];
    for text in cases {
        assert!(LlmJudge::parse_verdicts(text).is_none(), "{text} should not parse");
    }
}

#[test]
fn test_prompt_lists_both_sides() {
    let prompt = LlmJudge::build_prompt("lamp", &hits(&["Desk Lamp"]), &hits(&["Floor Lamp", "Bulb"]));

    assert!(prompt.contains("for the query: \"lamp\""));
    assert!(prompt.contains("Result 1:\nTitle: Desk Lamp\nDescription: About Desk Lamp"));
    assert!(prompt.contains("Result 2:\nTitle: Bulb"));
    assert!(prompt.contains("\"db1\""));
    assert!(prompt.contains("\"db2\""));
}

#[tokio::test]
async fn test_missing_key_degrades_to_sentinel() {
    let judge = LlmJudge::new(reqwest::Client::new(), JudgeSettings::default());

    let evaluation = judge.evaluate("lamp", &hits(&["A"]), &hits(&["B"])).await.unwrap();

    assert!(!judge.is_available());
    assert_eq!(evaluation.side_a.score, SENTINEL_SCORE);
    assert_eq!(evaluation.side_b.score, SENTINEL_SCORE);
    assert!(evaluation.usage.is_empty());
}

#[tokio::test]
async fn test_evaluate_scores_and_prices_usage() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            r#"{"db1": {"score": 8, "feedback": "on topic"}, "db2": {"score": 3.5, "feedback": "noisy"}}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;
    let judge = judge_for(&server);

    // Act
    let evaluation = judge.evaluate("lamp", &hits(&["A"]), &hits(&["B"])).await.unwrap();

    // Assert
    assert_eq!(evaluation.side_a.score, 8.0);
    assert_eq!(evaluation.side_b.feedback, "noisy");
    assert_eq!(evaluation.usage.prompt_tokens, 1_000_000);
    assert_eq!(evaluation.usage.completion_tokens, 200_000);
    assert!((evaluation.usage.input_cost - 0.30).abs() < 1e-9);
    assert!((evaluation.usage.output_cost - 0.50).abs() < 1e-9);
}

#[tokio::test]
async fn test_unreadable_answer_keeps_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("I refuse to answer in JSON")))
        .mount(&server)
        .await;
    let judge = judge_for(&server);

    let evaluation = judge.evaluate("lamp", &hits(&["A"]), &hits(&["B"])).await.unwrap();

    assert_eq!(evaluation.side_a.score, SENTINEL_SCORE);
    assert_eq!(evaluation.side_b.score, SENTINEL_SCORE);
    assert_eq!(evaluation.usage.prompt_tokens, 1_000_000);
}

#[tokio::test]
async fn test_http_error_is_judge_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let judge = judge_for(&server);

    let result = judge.evaluate("lamp", &hits(&["A"]), &hits(&["B"])).await;

    assert!(matches!(result, Err(OrchestratorError::JudgeFailed { .. })));
}
