//! Battle orchestrator
//!
//! Owns the battle lifecycle: creation, processing with concurrent per-query
//! fan-out, aggregation, retry, stale job sweeping and deletion. Every
//! collaborator (store, backend factory, judge) is injected, and processing
//! of one battle id is guarded so two runs never overlap in this process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::{json, Value};
use shared::{
    logging, process_debug, process_info, process_warn, split_query_lines, BackendRecord, Battle, BattleFilter,
    BattleQuery, BattleStatus, JobSubmission, NewBackend, ProcessId, QueryView, ResultRecord, SearchResponse, Side,
};
use uuid::Uuid;

use crate::core::{rollup, summarize, BattleRollup, BattleTransition, QueryScores};
use crate::error::{ErrorKind, OrchestratorError, OrchestratorResult};
use crate::services::credentials;
use crate::traits::{BackendFactory, Evaluation, Judge, JobStore, SearchBackend};
use crate::worker::DispatchHandle;

/// Deferred processing handle returned by create and retry
///
/// The battle is only processed once the ticket is submitted to a job queue
/// (or handed to `process_job` directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the battle is not processed until the ticket is submitted"]
pub struct JobTicket {
    battle_id: Uuid,
}

impl JobTicket {
    pub fn battle_id(&self) -> Uuid {
        self.battle_id
    }

    /// Enqueue the battle for background processing
    pub async fn submit(self, dispatch: &DispatchHandle) -> OrchestratorResult<()> {
        dispatch.dispatch(self.battle_id).await
    }
}

/// Releases a claimed battle id when processing ends
struct ActiveGuard {
    active: Arc<Mutex<HashSet<Uuid>>>,
    battle_id: Uuid,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.battle_id);
    }
}

/// One search call and its wall-clock duration
async fn timed_search(backend: &dyn SearchBackend, query: &str) -> OrchestratorResult<(SearchResponse, u64)> {
    let started = Instant::now();
    let response = backend.search(query).await?;
    Ok((response, started.elapsed().as_millis() as u64))
}

/// Core battle engine
pub struct BattleOrchestrator<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    /// Injected services
    store: S,
    factory: F,
    judge: J,

    /// Battle ids currently being processed by this instance
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl<S, F, J> BattleOrchestrator<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(store: S, factory: F, judge: J) -> Self {
        Self {
            store,
            factory,
            judge,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether this instance is processing the battle right now
    pub fn is_active(&self, battle_id: Uuid) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&battle_id)
    }

    fn try_claim(&self, battle_id: Uuid) -> Option<ActiveGuard> {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(battle_id) {
            return None;
        }
        Some(ActiveGuard {
            active: Arc::clone(&self.active),
            battle_id,
        })
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Validate a submission and persist the battle with one query per non-blank line
    pub async fn create_job(&self, submission: JobSubmission) -> OrchestratorResult<(Battle, JobTicket)> {
        let label = submission.label.trim();
        if label.is_empty() {
            return Err(OrchestratorError::invalid("Label is required"));
        }

        let lines = split_query_lines(&submission.queries);
        if lines.is_empty() {
            return Err(OrchestratorError::invalid("At least one query is required"));
        }

        if submission.rating_count < 1 {
            return Err(OrchestratorError::invalid("Rating count must be at least 1"));
        }

        if submission.backend_ref1 == submission.backend_ref2 && submission.config1 == submission.config2 {
            return Err(OrchestratorError::invalid(
                "Both sides use the same backend with the same config",
            ));
        }

        let now = Utc::now();
        let battle = Battle {
            id: Uuid::new_v4(),
            label: label.to_string(),
            backend_ref1: submission.backend_ref1,
            backend_ref2: submission.backend_ref2,
            config1: submission.config1,
            config2: submission.config2,
            queries: submission.queries,
            rating_count: submission.rating_count,
            status: BattleStatus::Pending,
            error: None,
            mean_score1: None,
            mean_score2: None,
            created_at: now,
            queued_at: now,
            completed_at: None,
            metadata: Default::default(),
            owner: submission.owner,
            is_demo: false,
        };

        let queries: Vec<BattleQuery> = lines
            .iter()
            .map(|line| BattleQuery::new(battle.id, line.as_str(), battle.rating_count))
            .collect();
        let query_count = queries.len();

        self.store.create_battle(battle.clone(), queries).await?;

        process_info!(
            ProcessId::current(),
            "🆕 Battle {} '{}' created with {} queries x {} ratings",
            battle.id,
            battle.label,
            query_count,
            battle.rating_count
        );

        let ticket = JobTicket { battle_id: battle.id };
        Ok((battle, ticket))
    }

    /// Run a pending battle to completion
    ///
    /// Setup failures and persistence failures are recorded on the battle and
    /// the failed battle is returned. An error is returned only when the battle
    /// is missing, already running, or its final status could not be written.
    pub async fn process_job(&self, battle_id: Uuid) -> OrchestratorResult<Battle> {
        let _guard = self
            .try_claim(battle_id)
            .ok_or(OrchestratorError::AlreadyInProgress { battle_id })?;

        let queries = self.store.list_queries(battle_id).await?;
        let battle = self.store.apply_transition(battle_id, BattleTransition::Start).await?;
        process_info!(
            ProcessId::current(),
            "⚔️ Battle {} started: {} queries",
            battle_id,
            queries.len()
        );

        let started = Instant::now();
        let outcome = self.run_battle(&battle, &queries).await;

        let finished = match outcome {
            Ok(rollup) => {
                let completion = BattleTransition::Complete {
                    mean_score1: rollup.mean_score1,
                    mean_score2: rollup.mean_score2,
                    metadata: rollup.metadata,
                };
                match self.store.apply_transition(battle_id, completion).await {
                    Ok(completed) => completed,
                    Err(e) if e.kind() == ErrorKind::Persistence => self.fail_battle(battle_id, &e).await?,
                    Err(e) => return Err(e),
                }
            }
            Err(e) => self.fail_battle(battle_id, &e).await?,
        };

        match finished.status {
            BattleStatus::Completed => logging::log_success(
                ProcessId::current(),
                &format!(
                    "Battle {} completed in {}ms: {:.2} vs {:.2} (cost ${:.5})",
                    battle_id,
                    started.elapsed().as_millis(),
                    finished.mean_score1.unwrap_or_default(),
                    finished.mean_score2.unwrap_or_default(),
                    finished.metadata.usage.total_cost
                ),
            ),
            _ => process_warn!(
                ProcessId::current(),
                "💥 Battle {} failed: {}",
                battle_id,
                finished.error.as_deref().unwrap_or("unknown error")
            ),
        }

        Ok(finished)
    }

    async fn fail_battle(&self, battle_id: Uuid, error: &OrchestratorError) -> OrchestratorResult<Battle> {
        logging::log_error(ProcessId::current(), &format!("Battle {battle_id}"), error);
        self.store
            .apply_transition(battle_id, BattleTransition::Fail { error: error.to_string() })
            .await
    }

    async fn run_battle(&self, battle: &Battle, queries: &[BattleQuery]) -> OrchestratorResult<BattleRollup> {
        let backends = self.resolve_backends(battle).await?;

        let outcomes = join_all(
            queries
                .iter()
                .map(|query| self.run_query(battle, &backends, query)),
        )
        .await;

        let scores = outcomes.into_iter().collect::<OrchestratorResult<Vec<_>>>()?;
        Ok(rollup(&scores))
    }

    /// Resolve both sides before building either, so credential problems fail fast
    async fn resolve_backends(&self, battle: &Battle) -> OrchestratorResult<[Arc<dyn SearchBackend>; 2]> {
        let mut resolved: Vec<(BackendRecord, credentials::CredentialDocument)> = Vec::with_capacity(2);
        for side in Side::BOTH {
            let backend_id = battle.backend_ref(side);
            let record = self
                .store
                .get_backend(backend_id)
                .await?
                .ok_or(OrchestratorError::BackendNotFound { backend_id })?;
            let document = credentials::parse(&record)?;
            resolved.push((record, document));
        }

        let mut built = Vec::with_capacity(2);
        for (side, (record, document)) in Side::BOTH.into_iter().zip(resolved.iter()) {
            let backend = self.factory.create(&record.provider, document, battle.config(side))?;
            process_debug!(
                ProcessId::current(),
                "🔌 Battle {} side {} uses {} ({})",
                battle.id,
                side.config_index(),
                record.label,
                backend.provider()
            );
            built.push(backend);
        }

        let second = built.pop();
        let first = built.pop();
        match (first, second) {
            (Some(first), Some(second)) => Ok([first, second]),
            _ => Err(OrchestratorError::invalid("battle requires two backends")),
        }
    }

    /// All rating attempts of one query, in sequence
    ///
    /// Backend and judge failures end the query and are recorded as its
    /// error. Persistence failures escape and fail the battle.
    async fn run_query(
        &self,
        battle: &Battle,
        backends: &[Arc<dyn SearchBackend>; 2],
        query: &BattleQuery,
    ) -> OrchestratorResult<QueryScores> {
        let mut scores = QueryScores::default();

        for rating_index in 1..=query.rating_count {
            match self.run_attempt(battle, backends, query, rating_index).await {
                Ok(evaluation) => scores.record(&evaluation),
                Err(e) if e.is_query_scoped() => {
                    process_warn!(
                        ProcessId::current(),
                        "⚠️ Query '{}' of battle {} failed on rating {}: {}",
                        query.query_text,
                        battle.id,
                        rating_index,
                        e
                    );
                    scores.fail();
                    self.store.set_query_error(query.id, Some(e.to_string())).await?;
                    return Ok(scores);
                }
                Err(e) => return Err(e),
            }
        }

        process_debug!(
            ProcessId::current(),
            "✔️ Query '{}' scored {:?} vs {:?}",
            query.query_text,
            scores.side1,
            scores.side2
        );
        Ok(scores)
    }

    /// Search both sides concurrently, judge, and persist one row per side
    async fn run_attempt(
        &self,
        battle: &Battle,
        backends: &[Arc<dyn SearchBackend>; 2],
        query: &BattleQuery,
        rating_index: u32,
    ) -> OrchestratorResult<Evaluation> {
        let text = query.query_text.as_str();
        let (first, second) = tokio::join!(
            timed_search(backends[0].as_ref(), text),
            timed_search(backends[1].as_ref(), text)
        );
        let (response1, search_ms1) = first?;
        let (response2, search_ms2) = second?;

        let evaluation = self.judge.evaluate(text, &response1.hits, &response2.hits).await?;

        let sides = [
            (Side::First, response1, search_ms1, &evaluation.side_a),
            (Side::Second, response2, search_ms2, &evaluation.side_b),
        ];
        for (side, response, search_ms, verdict) in sides {
            let mut metadata = response.metadata;
            metadata.insert("judgeUsage".to_string(), json!(evaluation.usage));

            let record = ResultRecord {
                id: Uuid::new_v4(),
                query_id: query.id,
                backend_id: battle.backend_ref(side),
                config_index: side.config_index(),
                rating_index,
                hits: response.hits,
                score: verdict.score,
                feedback: verdict.feedback.clone(),
                search_duration_ms: search_ms,
                judge_duration_ms: evaluation.duration_ms,
                metadata: Value::Object(metadata),
                created_at: Utc::now(),
            };
            self.store.insert_result(record).await?;
        }

        Ok(evaluation)
    }

    /// Discard prior results and move a finished battle back to pending
    pub async fn retry_job(&self, battle_id: Uuid) -> OrchestratorResult<(Battle, JobTicket)> {
        let battle = self.get_job(battle_id).await?;

        if battle.status == BattleStatus::InProgress || self.is_active(battle_id) {
            return Err(OrchestratorError::AlreadyInProgress { battle_id });
        }
        if !BattleTransition::Reset.permits(battle.status) {
            return Err(BattleTransition::Reset.rejection(&battle));
        }

        let removed = self.store.delete_results_for_battle(battle_id).await?;
        let battle = self.store.apply_transition(battle_id, BattleTransition::Reset).await?;

        process_info!(
            ProcessId::current(),
            "🔁 Battle {} reset for retry ({} prior results removed)",
            battle_id,
            removed
        );
        Ok((battle, JobTicket { battle_id }))
    }

    /// Fail every pending or running battle queued longer than `threshold` ago
    ///
    /// Results already written are left untouched. Returns the ids that were failed.
    pub async fn sweep_stale_jobs(&self, threshold: Duration) -> OrchestratorResult<Vec<Uuid>> {
        // A threshold reaching past the earliest representable time leaves nothing stale
        let cutoff = chrono::Duration::from_std(threshold)
            .ok()
            .and_then(|threshold| Utc::now().checked_sub_signed(threshold));
        let Some(cutoff) = cutoff else {
            process_debug!(ProcessId::current(), "Stale threshold {:?} predates every battle", threshold);
            return Ok(Vec::new());
        };

        let stale: Vec<Battle> = self
            .store
            .list_unfinished_battles()
            .await?
            .into_iter()
            .filter(|battle| battle.queued_at < cutoff)
            .collect();

        let mut swept = Vec::with_capacity(stale.len());
        for battle in stale {
            match self.store.apply_transition(battle.id, BattleTransition::TimeOut).await {
                Ok(_) => {
                    process_warn!(
                        ProcessId::current(),
                        "⏰ Battle {} timed out (queued at {})",
                        battle.id,
                        battle.queued_at
                    );
                    swept.push(battle.id);
                }
                // Finished or deleted between the scan and the update
                Err(e) if matches!(e.kind(), ErrorKind::Conflict | ErrorKind::NotFound) => {
                    process_debug!(ProcessId::current(), "Skipping battle {}: {}", battle.id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(swept)
    }

    /// Remove a battle with its queries and results
    pub async fn delete_job(&self, battle_id: Uuid) -> OrchestratorResult<()> {
        if !self.store.delete_battle(battle_id).await? {
            return Err(OrchestratorError::BattleNotFound { battle_id });
        }
        process_info!(ProcessId::current(), "🗑️ Battle {} deleted", battle_id);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------------

    pub async fn get_job(&self, battle_id: Uuid) -> OrchestratorResult<Battle> {
        self.store
            .get_battle(battle_id)
            .await?
            .ok_or(OrchestratorError::BattleNotFound { battle_id })
    }

    pub async fn list_jobs(&self, filter: BattleFilter) -> OrchestratorResult<Vec<Battle>> {
        self.store.list_battles(filter).await
    }

    /// Every query of a battle with its rating attempts and per-side score summaries
    pub async fn query_results(&self, battle_id: Uuid) -> OrchestratorResult<Vec<QueryView>> {
        self.get_job(battle_id).await?;
        let queries = self.store.list_queries(battle_id).await?;
        let results = self.store.list_results(battle_id).await?;

        let mut by_query: HashMap<Uuid, Vec<ResultRecord>> = HashMap::new();
        for result in results {
            by_query.entry(result.query_id).or_default().push(result);
        }

        Ok(queries
            .into_iter()
            .map(|query| {
                let attempts = by_query.remove(&query.id).unwrap_or_default();
                // A failed query's earlier attempts stay visible but are not summarized,
                // matching the battle means
                let counted = query.error.is_none();
                let side_scores = |side: Side| {
                    attempts
                        .iter()
                        .filter(|r| counted && r.side() == Some(side))
                        .map(|r| r.score)
                        .collect::<Vec<_>>()
                };
                QueryView {
                    query_id: query.id,
                    query_text: query.query_text,
                    error: query.error,
                    summary1: summarize(side_scores(Side::First)),
                    summary2: summarize(side_scores(Side::Second)),
                    per_attempt: attempts.iter().map(Into::into).collect(),
                }
            })
            .collect())
    }

    pub async fn set_demo(&self, battle_id: Uuid, is_demo: bool) -> OrchestratorResult<Battle> {
        self.store.set_demo(battle_id, is_demo).await
    }

    // ---------------------------------------------------------------------
    // Backends
    // ---------------------------------------------------------------------

    /// Register a backend; the provider must be known and any credentials must pass the envelope checks
    pub async fn register_backend(&self, request: NewBackend) -> OrchestratorResult<BackendRecord> {
        let label = request.label.trim();
        if label.is_empty() {
            return Err(OrchestratorError::invalid("Backend label is required"));
        }
        if !self.factory.supports(&request.provider) {
            return Err(OrchestratorError::UnknownProvider {
                provider: request.provider,
            });
        }

        let record = BackendRecord::new(label, request.provider, request.credentials);
        if record.credentials.as_deref().is_some_and(|c| !c.trim().is_empty()) {
            credentials::parse(&record)?;
        }

        self.store.insert_backend(record.clone()).await?;
        process_info!(
            ProcessId::current(),
            "🔌 Backend {} '{}' registered ({})",
            record.id,
            record.label,
            record.provider
        );
        Ok(record)
    }

    pub async fn list_backends(&self) -> OrchestratorResult<Vec<BackendRecord>> {
        self.store.list_backends().await
    }

    pub async fn delete_backend(&self, backend_id: Uuid) -> OrchestratorResult<()> {
        if !self.store.delete_backend(backend_id).await? {
            return Err(OrchestratorError::BackendNotFound { backend_id });
        }
        Ok(())
    }
}
