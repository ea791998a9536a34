//! Service-specific tests
//!
//! Each service has its own test file. The job store behaviour both stores
//! must share lives in `store_contract` and is run against each of them.

#[cfg(test)]
mod judge;
#[cfg(test)]
mod store_contract;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use shared::{BackendRecord, Battle, BattleQuery, BattleStatus, ResultRecord, SearchHit, VersionedConfig};
    use uuid::Uuid;

    use crate::services::credentials::CredentialDocument;

    /// Battle with two queries, created `age_secs` ago
    pub fn battle_with_queries(label: &str, age_secs: i64) -> (Battle, Vec<BattleQuery>) {
        let created = Utc::now() - Duration::seconds(age_secs);
        let battle = Battle {
            id: Uuid::new_v4(),
            label: label.to_string(),
            backend_ref1: Uuid::new_v4(),
            backend_ref2: Uuid::new_v4(),
            config1: VersionedConfig::default(),
            config2: VersionedConfig::new(json!({ "topK": 5 })),
            queries: "red shoes\nblue hat".to_string(),
            rating_count: 2,
            status: BattleStatus::Pending,
            error: None,
            mean_score1: None,
            mean_score2: None,
            created_at: created,
            queued_at: created,
            completed_at: None,
            metadata: Default::default(),
            owner: None,
            is_demo: false,
        };
        let queries = vec![
            BattleQuery::new(battle.id, "red shoes", battle.rating_count),
            BattleQuery::new(battle.id, "blue hat", battle.rating_count),
        ];
        (battle, queries)
    }

    /// Result row for one side of one rating attempt
    pub fn result_for(query: &BattleQuery, config_index: u8, rating_index: u32, score: f64) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            query_id: query.id,
            backend_id: Uuid::new_v4(),
            config_index,
            rating_index,
            hits: vec![SearchHit::new("1", "Red Shoe", "A red running shoe").with_score(0.9)],
            score,
            feedback: "relevant".to_string(),
            search_duration_ms: 12,
            judge_duration_ms: 340,
            metadata: json!({ "totalResults": 1 }),
            created_at: Utc::now(),
        }
    }

    pub fn backend(provider: &str, credentials: Option<&str>) -> BackendRecord {
        BackendRecord::new("Test backend", provider, credentials.map(str::to_string))
    }

    pub fn document(body: Value) -> CredentialDocument {
        CredentialDocument::new(body)
    }
}
