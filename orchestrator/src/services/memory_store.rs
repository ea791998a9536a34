//! In-memory job store
//!
//! Used by tests and by `--database :memory:` style ephemeral runs where
//! nothing needs to survive the process.

use std::collections::HashMap;

use chrono::Utc;
use shared::{BackendRecord, Battle, BattleFilter, BattleQuery, ResultRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::BattleTransition;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::JobStore;

#[derive(Default)]
struct Tables {
    backends: HashMap<Uuid, BackendRecord>,
    battles: HashMap<Uuid, Battle>,
    /// Submission order is preserved
    queries: Vec<BattleQuery>,
    results: Vec<ResultRecord>,
}

impl Tables {
    fn query_ids(&self, battle_id: Uuid) -> Vec<Uuid> {
        self.queries
            .iter()
            .filter(|q| q.battle_id == battle_id)
            .map(|q| q.id)
            .collect()
    }
}

/// Job store that keeps everything behind one async lock
#[derive(Default)]
pub struct MemoryJobStore {
    tables: RwLock<Tables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_backend(&self, record: BackendRecord) -> OrchestratorResult<()> {
        let mut tables = self.tables.write().await;
        if tables.backends.contains_key(&record.id) {
            return Err(OrchestratorError::storage("insert_backend", format!("backend {} already exists", record.id)));
        }
        tables.backends.insert(record.id, record);
        Ok(())
    }

    async fn get_backend(&self, id: Uuid) -> OrchestratorResult<Option<BackendRecord>> {
        Ok(self.tables.read().await.backends.get(&id).cloned())
    }

    async fn list_backends(&self) -> OrchestratorResult<Vec<BackendRecord>> {
        let tables = self.tables.read().await;
        let mut backends: Vec<_> = tables.backends.values().cloned().collect();
        backends.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backends)
    }

    async fn delete_backend(&self, id: Uuid) -> OrchestratorResult<bool> {
        Ok(self.tables.write().await.backends.remove(&id).is_some())
    }

    async fn create_battle(&self, battle: Battle, queries: Vec<BattleQuery>) -> OrchestratorResult<()> {
        let mut tables = self.tables.write().await;
        if tables.battles.contains_key(&battle.id) {
            return Err(OrchestratorError::storage("create_battle", format!("battle {} already exists", battle.id)));
        }
        if let Some(stray) = queries.iter().find(|q| q.battle_id != battle.id) {
            return Err(OrchestratorError::storage(
                "create_battle",
                format!("query {} belongs to another battle", stray.id),
            ));
        }
        tables.battles.insert(battle.id, battle);
        tables.queries.extend(queries);
        Ok(())
    }

    async fn get_battle(&self, id: Uuid) -> OrchestratorResult<Option<Battle>> {
        Ok(self.tables.read().await.battles.get(&id).cloned())
    }

    async fn list_battles(&self, filter: BattleFilter) -> OrchestratorResult<Vec<Battle>> {
        let tables = self.tables.read().await;
        let mut battles: Vec<_> = tables
            .battles
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        battles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(battles)
    }

    async fn list_unfinished_battles(&self) -> OrchestratorResult<Vec<Battle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .battles
            .values()
            .filter(|b| b.status.is_unfinished())
            .cloned()
            .collect())
    }

    async fn apply_transition(&self, id: Uuid, transition: BattleTransition) -> OrchestratorResult<Battle> {
        let mut tables = self.tables.write().await;
        let battle = tables
            .battles
            .get_mut(&id)
            .ok_or(OrchestratorError::BattleNotFound { battle_id: id })?;

        if !transition.permits(battle.status) {
            return Err(transition.rejection(battle));
        }
        transition.apply_to(battle, Utc::now());
        let updated = battle.clone();

        if transition == BattleTransition::Reset {
            for query in tables.queries.iter_mut().filter(|q| q.battle_id == id) {
                query.error = None;
            }
        }
        Ok(updated)
    }

    async fn set_demo(&self, id: Uuid, is_demo: bool) -> OrchestratorResult<Battle> {
        let mut tables = self.tables.write().await;
        let battle = tables
            .battles
            .get_mut(&id)
            .ok_or(OrchestratorError::BattleNotFound { battle_id: id })?;
        battle.is_demo = is_demo;
        Ok(battle.clone())
    }

    async fn delete_battle(&self, id: Uuid) -> OrchestratorResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.battles.remove(&id).is_none() {
            return Ok(false);
        }
        let query_ids = tables.query_ids(id);
        tables.results.retain(|r| !query_ids.contains(&r.query_id));
        tables.queries.retain(|q| q.battle_id != id);
        Ok(true)
    }

    async fn list_queries(&self, battle_id: Uuid) -> OrchestratorResult<Vec<BattleQuery>> {
        let tables = self.tables.read().await;
        Ok(tables
            .queries
            .iter()
            .filter(|q| q.battle_id == battle_id)
            .cloned()
            .collect())
    }

    async fn set_query_error(&self, query_id: Uuid, error: Option<String>) -> OrchestratorResult<()> {
        let mut tables = self.tables.write().await;
        let query = tables
            .queries
            .iter_mut()
            .find(|q| q.id == query_id)
            .ok_or_else(|| OrchestratorError::storage("set_query_error", format!("query {query_id} not found")))?;
        query.error = error;
        Ok(())
    }

    async fn insert_result(&self, record: ResultRecord) -> OrchestratorResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.queries.iter().any(|q| q.id == record.query_id) {
            return Err(OrchestratorError::storage(
                "insert_result",
                format!("query {} not found", record.query_id),
            ));
        }
        let duplicate = tables.results.iter().any(|r| {
            r.query_id == record.query_id
                && r.config_index == record.config_index
                && r.rating_index == record.rating_index
        });
        if duplicate {
            return Err(OrchestratorError::DuplicateResult {
                query_id: record.query_id,
                config_index: record.config_index,
                rating_index: record.rating_index,
            });
        }
        tables.results.push(record);
        Ok(())
    }

    async fn delete_results_for_battle(&self, battle_id: Uuid) -> OrchestratorResult<usize> {
        let mut tables = self.tables.write().await;
        let query_ids = tables.query_ids(battle_id);
        let before = tables.results.len();
        tables.results.retain(|r| !query_ids.contains(&r.query_id));
        Ok(before - tables.results.len())
    }

    async fn list_results(&self, battle_id: Uuid) -> OrchestratorResult<Vec<ResultRecord>> {
        let tables = self.tables.read().await;
        let query_ids = tables.query_ids(battle_id);
        let position = |id: &Uuid| query_ids.iter().position(|q| q == id).unwrap_or(usize::MAX);

        let mut results: Vec<_> = tables
            .results
            .iter()
            .filter(|r| query_ids.contains(&r.query_id))
            .cloned()
            .collect();
        results.sort_by_key(|r| (position(&r.query_id), r.config_index, r.rating_index));
        Ok(results)
    }
}
