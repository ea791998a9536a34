//! Trait definitions with mockall annotations for testing
//!
//! These are the seams the battle orchestrator is built on: the search
//! capability each provider implements, the judge that scores two result
//! sets, the factory that turns a backend record into a search capability,
//! and the durable job store. All are injected, so every collaborator can be
//! replaced by a mock or a scripted fake in tests.

use std::sync::Arc;

use shared::{
    BackendRecord, Battle, BattleFilter, BattleQuery, JudgeUsage, ResultRecord, SearchHit, SearchResponse,
    VersionedConfig, SENTINEL_SCORE,
};
use uuid::Uuid;

use crate::core::BattleTransition;
use crate::error::OrchestratorResult;
use crate::services::credentials::CredentialDocument;

/// Score and free-text justification for one side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct SideVerdict {
    pub score: f64,
    pub feedback: String,
}

impl SideVerdict {
    pub fn new(score: f64, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
        }
    }

    /// Sentinel verdict with empty feedback
    pub fn unavailable() -> Self {
        Self {
            score: SENTINEL_SCORE,
            feedback: String::new(),
        }
    }
}

/// Output of one judging pass
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub side_a: SideVerdict,
    pub side_b: SideVerdict,
    pub usage: JudgeUsage,
    pub duration_ms: u64,
}

impl Evaluation {
    /// Both sides degrade to the sentinel; usage is kept so spent tokens are still accounted
    pub fn unavailable(usage: JudgeUsage, duration_ms: u64) -> Self {
        Self {
            side_a: SideVerdict::unavailable(),
            side_b: SideVerdict::unavailable(),
            usage,
            duration_ms,
        }
    }
}

/// Search capability implemented once per provider
///
/// Provider configuration is validated and bound when the instance is built,
/// so a call only carries the query text. Implementations either return hits
/// or raise; callers own timing.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Provider key this instance was built for
    fn provider(&self) -> &str;

    /// Run one query
    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse>;
}

/// Comparative scorer for two result sets
///
/// Scores are in [1.0, 10.0]. When the judge is unavailable or its output
/// cannot be parsed, both sides come back as the sentinel instead of an error.
/// A transport failure is an error.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, query: &str, hits_a: &[SearchHit], hits_b: &[SearchHit]) -> OrchestratorResult<Evaluation>;
}

/// Builds search capabilities from a provider key, credentials and a battle-side config
#[mockall::automock]
pub trait BackendFactory: Send + Sync {
    /// Whether a provider key is registered
    fn supports(&self, provider: &str) -> bool;

    /// Validate credentials and config against the provider schema and build an instance
    fn create(
        &self,
        provider: &str,
        credentials: &CredentialDocument,
        config: &VersionedConfig,
    ) -> OrchestratorResult<Arc<dyn SearchBackend>>;
}

/// Durable store for backends, battles, queries and results
///
/// Deleting a battle cascades to its queries and results. Results are
/// unique on (query, config index, rating index). Status changes go through
/// `apply_transition`, which only applies a transition the current status permits.
#[mockall::automock]
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_backend(&self, record: BackendRecord) -> OrchestratorResult<()>;

    async fn get_backend(&self, id: Uuid) -> OrchestratorResult<Option<BackendRecord>>;

    async fn list_backends(&self) -> OrchestratorResult<Vec<BackendRecord>>;

    /// Returns whether a backend was removed
    async fn delete_backend(&self, id: Uuid) -> OrchestratorResult<bool>;

    /// Persist a battle with all of its queries atomically
    async fn create_battle(&self, battle: Battle, queries: Vec<BattleQuery>) -> OrchestratorResult<()>;

    async fn get_battle(&self, id: Uuid) -> OrchestratorResult<Option<Battle>>;

    /// Newest first
    async fn list_battles(&self, filter: BattleFilter) -> OrchestratorResult<Vec<Battle>>;

    /// Battles that are pending or in progress
    async fn list_unfinished_battles(&self) -> OrchestratorResult<Vec<Battle>>;

    /// Apply a status transition if the stored status permits it; returns the updated battle
    async fn apply_transition(&self, id: Uuid, transition: BattleTransition) -> OrchestratorResult<Battle>;

    async fn set_demo(&self, id: Uuid, is_demo: bool) -> OrchestratorResult<Battle>;

    /// Returns whether a battle was removed
    async fn delete_battle(&self, id: Uuid) -> OrchestratorResult<bool>;

    /// Queries of a battle in submission order
    async fn list_queries(&self, battle_id: Uuid) -> OrchestratorResult<Vec<BattleQuery>>;

    async fn set_query_error(&self, query_id: Uuid, error: Option<String>) -> OrchestratorResult<()>;

    async fn insert_result(&self, record: ResultRecord) -> OrchestratorResult<()>;

    /// Remove every result for every query of a battle; returns the number removed
    async fn delete_results_for_battle(&self, battle_id: Uuid) -> OrchestratorResult<usize>;

    /// Results of a battle ordered by query, config index and rating index
    async fn list_results(&self, battle_id: Uuid) -> OrchestratorResult<Vec<ResultRecord>>;
}
