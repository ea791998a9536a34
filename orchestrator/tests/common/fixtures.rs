//! Test fixtures and data for orchestrator tests
//!
//! Consistent provider keys, credentials and query sets used across suites.

use chrono::Utc;
use shared::{Battle, BattleStatus, SearchHit, VersionedConfig};
use uuid::Uuid;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Provider keys registered by the test registry
    pub const PROVIDER_A: &'static str = "scripted_a";
    pub const PROVIDER_B: &'static str = "scripted_b";

    /// Credential document accepted by the envelope checks
    pub const CREDENTIALS: &'static str = r#"{"version":1,"token":"test-token"}"#;

    /// Pre-versioned credential formats
    pub const ENV_CREDENTIALS: &'static str = "SEARCH_URL=https://search.example\nSEARCH_TOKEN=abc";
    pub const UNVERSIONED_CREDENTIALS: &'static str = r#"{"token":"abc"}"#;

    pub const LABEL: &'static str = "Semantic vs keyword";

    /// Owners used for listing and visibility tests
    pub const OWNER_ALICE: &'static str = "session-alice";
    pub const OWNER_BOB: &'static str = "session-bob";

    /// Two queries with blank and padded lines around them
    pub const QUERIES_XY: &'static str = "  x  \n\n y\n   \n";

    pub fn hits_for(backend: &str, query: &str) -> Vec<SearchHit> {
        vec![
            SearchHit::new(format!("{backend}-{query}-1"), format!("{query} one"), format!("{backend} says {query}"))
                .with_score(0.9),
            SearchHit::new(format!("{backend}-{query}-2"), format!("{query} two"), "second hit").with_score(0.5),
        ]
    }

    /// A pending battle that was never stored; used by mock-driven tests
    pub fn pending_battle(backend1: Uuid, backend2: Uuid) -> Battle {
        let now = Utc::now();
        Battle {
            id: Uuid::new_v4(),
            label: Self::LABEL.to_string(),
            backend_ref1: backend1,
            backend_ref2: backend2,
            config1: VersionedConfig::default(),
            config2: VersionedConfig::default(),
            queries: "x".to_string(),
            rating_count: 1,
            status: BattleStatus::Pending,
            error: None,
            mean_score1: None,
            mean_score2: None,
            created_at: now,
            queued_at: now,
            completed_at: None,
            metadata: Default::default(),
            owner: None,
            is_demo: false,
        }
    }
}
