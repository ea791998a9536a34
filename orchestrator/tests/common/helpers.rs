//! Test helpers and builder patterns for orchestrator tests
//!
//! Scripted fakes stand in for the search providers and the judge so that
//! multi-query, multi-attempt battles produce deterministic scores. The
//! orchestrator under test runs on the real in-memory store and the real
//! provider registry.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orchestrator::services::{BackendRegistry, MemoryJobStore};
use orchestrator::{
    BackendFactory, BattleOrchestrator, Evaluation, JobStore, Judge, MockBackendFactory, MockJobStore, MockJudge,
    OrchestratorError, OrchestratorResult, SearchBackend, SideVerdict,
};
use shared::{
    BackendRecord, Battle, BattleStatus, JobSubmission, JudgeUsage, ResultRecord, SearchHit, SearchResponse,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::fixtures::TestFixtures;

/// Search backend that answers from fixtures and fails on chosen queries
pub struct ScriptedBackend {
    name: String,
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failing: HashSet::new(),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Raise a search error for this query
    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Block every search until the gate has permits
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SearchBackend for ScriptedBackend {
    fn provider(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| OrchestratorError::search(&self.name, e))?;
        }
        if self.failing.contains(query) {
            return Err(OrchestratorError::search(&self.name, format!("no index for '{query}'")));
        }
        Ok(SearchResponse::new(TestFixtures::hits_for(&self.name, query))
            .with_metadata("backend", serde_json::json!(self.name)))
    }
}

/// Judge that returns fixed scores per query and the sentinel otherwise
///
/// Clones share the call counter.
#[derive(Clone, Default)]
pub struct ScriptedJudge {
    scores: HashMap<String, (f64, f64)>,
    failing: HashSet<String>,
    /// Query -> number of passes judged before every later pass fails
    failing_after: HashMap<String, usize>,
    judged: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoring(mut self, query: &str, score_a: f64, score_b: f64) -> Self {
        self.scores.insert(query.to_string(), (score_a, score_b));
        self
    }

    /// Raise a judge error for this query
    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Judge this query `passes` times, then raise a judge error
    pub fn failing_after(mut self, query: &str, passes: usize) -> Self {
        self.failing_after.insert(query.to_string(), passes);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Usage reported by every scripted call
    pub fn usage_per_call() -> JudgeUsage {
        JudgeUsage::priced(1_000, 200, 0.30, 2.50)
    }
}

#[async_trait::async_trait]
impl Judge for ScriptedJudge {
    async fn evaluate(&self, query: &str, _hits_a: &[SearchHit], _hits_b: &[SearchHit]) -> OrchestratorResult<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let judged = {
            let mut judged = self.judged.lock().unwrap();
            let count = judged.entry(query.to_string()).or_default();
            *count += 1;
            *count
        };
        let exhausted = self.failing_after.get(query).is_some_and(|&passes| judged > passes);
        if self.failing.contains(query) || exhausted {
            return Err(OrchestratorError::judge("HTTP 503 Service Unavailable"));
        }
        Ok(match self.scores.get(query) {
            Some(&(a, b)) => Evaluation {
                side_a: SideVerdict::new(a, format!("side a on {query}")),
                side_b: SideVerdict::new(b, format!("side b on {query}")),
                usage: Self::usage_per_call(),
                duration_ms: 5,
            },
            None => Evaluation::unavailable(Self::usage_per_call(), 5),
        })
    }
}

/// Type alias for the orchestrator used by scripted scenarios
pub type TestOrchestrator<J = ScriptedJudge> = BattleOrchestrator<MemoryJobStore, BackendRegistry, J>;

/// Type alias for test orchestrator with all mocks
pub type MockOrchestrator = BattleOrchestrator<MockJobStore, MockBackendFactory, MockJudge>;

/// Builder for an orchestrator with two registered scripted backends
pub struct OrchestratorBuilder {
    backend_a: Arc<ScriptedBackend>,
    backend_b: Arc<ScriptedBackend>,
    credentials_b: Option<String>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            backend_a: Arc::new(ScriptedBackend::new(TestFixtures::PROVIDER_A)),
            backend_b: Arc::new(ScriptedBackend::new(TestFixtures::PROVIDER_B)),
            credentials_b: Some(TestFixtures::CREDENTIALS.to_string()),
        }
    }

    pub fn with_backend_a(mut self, backend: ScriptedBackend) -> Self {
        self.backend_a = Arc::new(backend);
        self
    }

    pub fn with_backend_b(mut self, backend: ScriptedBackend) -> Self {
        self.backend_b = Arc::new(backend);
        self
    }

    /// Store these raw credentials on the second backend record
    pub fn with_credentials_b(mut self, credentials: Option<&str>) -> Self {
        self.credentials_b = credentials.map(str::to_string);
        self
    }

    fn registry(&self) -> BackendRegistry {
        let backend_a = Arc::clone(&self.backend_a);
        let backend_b = Arc::clone(&self.backend_b);
        BackendRegistry::new()
            .register(TestFixtures::PROVIDER_A, move |_, _| {
                Ok(Arc::clone(&backend_a) as Arc<dyn SearchBackend>)
            })
            .register(TestFixtures::PROVIDER_B, move |_, _| {
                Ok(Arc::clone(&backend_b) as Arc<dyn SearchBackend>)
            })
    }

    /// Build with a scripted judge
    pub async fn build(self, judge: ScriptedJudge) -> Arena {
        let mut arena = self.build_with_judge(judge.clone()).await;
        arena.judge = Some(judge);
        arena
    }

    /// Build with any judge implementation, seeding both backend records
    pub async fn build_with_judge<J: Judge + 'static>(self, judge: J) -> Arena<J> {
        let store = MemoryJobStore::new();
        let record_a = BackendRecord::new(
            "Backend A",
            TestFixtures::PROVIDER_A,
            Some(TestFixtures::CREDENTIALS.to_string()),
        );
        let record_b = BackendRecord::new("Backend B", TestFixtures::PROVIDER_B, self.credentials_b.clone());
        store.insert_backend(record_a.clone()).await.unwrap();
        store.insert_backend(record_b.clone()).await.unwrap();

        let registry = self.registry();
        Arena {
            orchestrator: Arc::new(BattleOrchestrator::new(store, registry, judge)),
            backend1: record_a.id,
            backend2: record_b.id,
            backend_a: self.backend_a,
            backend_b: self.backend_b,
            judge: None,
        }
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An orchestrator with its seeded backends and scripted collaborators
pub struct Arena<J: Judge + 'static = ScriptedJudge> {
    pub orchestrator: Arc<TestOrchestrator<J>>,
    pub backend1: Uuid,
    pub backend2: Uuid,
    pub backend_a: Arc<ScriptedBackend>,
    pub backend_b: Arc<ScriptedBackend>,
    pub judge: Option<ScriptedJudge>,
}

impl<J: Judge + 'static> Arena<J> {
    pub fn submission(&self, queries: &str, rating_count: u32) -> JobSubmission {
        JobSubmission {
            label: TestFixtures::LABEL.to_string(),
            backend_ref1: self.backend1,
            backend_ref2: self.backend2,
            config1: Default::default(),
            config2: Default::default(),
            queries: queries.to_string(),
            rating_count,
            owner: None,
        }
    }

    /// Create a battle and process it in place
    pub async fn run(&self, queries: &str, rating_count: u32) -> Battle {
        let (battle, ticket) = self
            .orchestrator
            .create_job(self.submission(queries, rating_count))
            .await
            .unwrap();
        assert_eq!(ticket.battle_id(), battle.id);
        self.orchestrator.process_job(battle.id).await.unwrap()
    }

    pub async fn results(&self, battle_id: Uuid) -> Vec<ResultRecord> {
        self.orchestrator.store().list_results(battle_id).await.unwrap()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Poll until the battle reaches `status` or the deadline passes
    pub async fn wait_for_status<S, F, J>(
        orchestrator: &BattleOrchestrator<S, F, J>,
        battle_id: Uuid,
        status: BattleStatus,
    ) -> Battle
    where
        S: JobStore + 'static,
        F: BackendFactory + 'static,
        J: Judge + 'static,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let battle = orchestrator.get_job(battle_id).await.unwrap();
            if battle.status == status {
                return battle;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "battle {battle_id} stuck in {} waiting for {status}",
                battle.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Yield until a battle is claimed by a running `process_job`
    pub async fn wait_until_active<S, F, J>(orchestrator: &BattleOrchestrator<S, F, J>, battle_id: Uuid)
    where
        S: JobStore + 'static,
        F: BackendFactory + 'static,
        J: Judge + 'static,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !orchestrator.is_active(battle_id) {
            assert!(tokio::time::Instant::now() < deadline, "battle {battle_id} never started");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Results of one side, in stored order
    pub fn side(results: &[ResultRecord], config_index: u8) -> Vec<&ResultRecord> {
        results.iter().filter(|r| r.config_index == config_index).collect()
    }

    pub fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("mean score should be set");
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }
}
