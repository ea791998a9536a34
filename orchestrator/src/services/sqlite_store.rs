//! SQLite-backed job store
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! Queries cascade from battles and results cascade from queries. Results are
//! unique on (query_id, config_index, rating_index). The schema version is
//! tracked with SQLite's `user_version` pragma.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use shared::{BackendRecord, Battle, BattleFilter, BattleQuery, BattleStatus, ResultRecord};
use uuid::Uuid;

use crate::core::BattleTransition;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::JobStore;

/// Current schema version. Increment when making schema changes and add a migration step.
const SCHEMA_VERSION: i32 = 1;

/// Location string that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

const BATTLE_COLUMNS: &str = "id, label, backend_ref1, backend_ref2, config1, config2, queries, rating_count, \
     status, error, mean_score1, mean_score2, created_at, queued_at, completed_at, metadata, owner, is_demo";

const RESULT_COLUMNS: &str = "r.id, r.query_id, r.backend_id, r.config_index, r.rating_index, r.hits, r.score, \
     r.feedback, r.search_duration_ms, r.judge_duration_ms, r.metadata, r.created_at";

#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> OrchestratorResult<Self> {
        let conn = Connection::open(path).map_err(|e| OrchestratorError::storage("open", e))?;
        Self::with_connection(conn)
    }

    /// Fresh in-memory database
    pub fn memory() -> OrchestratorResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| OrchestratorError::storage("open", e))?;
        Self::with_connection(conn)
    }

    /// `:memory:` or a file path
    pub fn open_location(location: &str) -> OrchestratorResult<Self> {
        if location == IN_MEMORY {
            Self::memory()
        } else {
            Self::open(Path::new(location))
        }
    }

    fn with_connection(conn: Connection) -> OrchestratorResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Current `user_version` of the open database
    pub async fn schema_version(&self) -> OrchestratorResult<i32> {
        self.run("schema_version", |conn| {
            Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
        })
        .await
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> OrchestratorResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> OrchestratorResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| OrchestratorError::storage(operation, "connection mutex poisoned"))?;
            f(&mut guard).map_err(|e| match e {
                OrchestratorError::Storage { message, .. } => OrchestratorError::storage(operation, message),
                other => other,
            })
        })
        .await
        .map_err(|e| OrchestratorError::storage(operation, e))?
    }
}

fn init_schema(conn: &Connection) -> OrchestratorResult<()> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version > SCHEMA_VERSION {
        return Err(OrchestratorError::storage(
            "init_schema",
            format!("database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"),
        ));
    }

    if current_version < 1 {
        migrate_v0_to_v1(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn migrate_v0_to_v1(conn: &Connection) -> OrchestratorResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS backends (
            id          BLOB PRIMARY KEY,
            label       TEXT NOT NULL,
            provider    TEXT NOT NULL,
            credentials TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS battles (
            id           BLOB PRIMARY KEY,
            label        TEXT NOT NULL,
            backend_ref1 BLOB NOT NULL,
            backend_ref2 BLOB NOT NULL,
            config1      TEXT NOT NULL,
            config2      TEXT NOT NULL,
            queries      TEXT NOT NULL,
            rating_count INTEGER NOT NULL CHECK (rating_count >= 1),
            status       TEXT NOT NULL,
            error        TEXT,
            mean_score1  REAL,
            mean_score2  REAL,
            created_at   TEXT NOT NULL,
            queued_at    TEXT NOT NULL,
            completed_at TEXT,
            metadata     TEXT NOT NULL,
            owner        TEXT,
            is_demo      INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_battles_status ON battles(status);
        CREATE INDEX IF NOT EXISTS idx_battles_owner ON battles(owner);

        CREATE TABLE IF NOT EXISTS battle_queries (
            id           BLOB PRIMARY KEY,
            battle_id    BLOB NOT NULL REFERENCES battles(id) ON DELETE CASCADE,
            position     INTEGER NOT NULL,
            query_text   TEXT NOT NULL,
            error        TEXT,
            rating_count INTEGER NOT NULL CHECK (rating_count >= 1),
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_battle_queries_battle ON battle_queries(battle_id, position);

        CREATE TABLE IF NOT EXISTS results (
            id                 BLOB PRIMARY KEY,
            query_id           BLOB NOT NULL REFERENCES battle_queries(id) ON DELETE CASCADE,
            backend_id         BLOB NOT NULL,
            config_index       INTEGER NOT NULL CHECK (config_index IN (1, 2)),
            rating_index       INTEGER NOT NULL CHECK (rating_index >= 1),
            hits               TEXT NOT NULL,
            score              REAL NOT NULL,
            feedback           TEXT NOT NULL,
            search_duration_ms INTEGER NOT NULL,
            judge_duration_ms  INTEGER NOT NULL,
            metadata           TEXT NOT NULL,
            created_at         TEXT NOT NULL,
            UNIQUE (query_id, config_index, rating_index)
        );
        "#,
    )?;
    Ok(())
}

fn conversion_error(idx: usize, error: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn backend_from_row(row: &Row<'_>) -> rusqlite::Result<BackendRecord> {
    Ok(BackendRecord {
        id: row.get(0)?,
        label: row.get(1)?,
        provider: row.get(2)?,
        credentials: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn battle_from_row(row: &Row<'_>) -> rusqlite::Result<Battle> {
    let status: String = row.get(8)?;
    Ok(Battle {
        id: row.get(0)?,
        label: row.get(1)?,
        backend_ref1: row.get(2)?,
        backend_ref2: row.get(3)?,
        config1: json_column(row, 4)?,
        config2: json_column(row, 5)?,
        queries: row.get(6)?,
        rating_count: row.get(7)?,
        status: status.parse::<BattleStatus>().map_err(|e| conversion_error(8, e))?,
        error: row.get(9)?,
        mean_score1: row.get(10)?,
        mean_score2: row.get(11)?,
        created_at: row.get(12)?,
        queued_at: row.get(13)?,
        completed_at: row.get(14)?,
        metadata: json_column(row, 15)?,
        owner: row.get(16)?,
        is_demo: row.get(17)?,
    })
}

fn query_from_row(row: &Row<'_>) -> rusqlite::Result<BattleQuery> {
    Ok(BattleQuery {
        id: row.get(0)?,
        battle_id: row.get(1)?,
        query_text: row.get(2)?,
        error: row.get(3)?,
        rating_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ResultRecord> {
    let search_ms: i64 = row.get(8)?;
    let judge_ms: i64 = row.get(9)?;
    Ok(ResultRecord {
        id: row.get(0)?,
        query_id: row.get(1)?,
        backend_id: row.get(2)?,
        config_index: row.get(3)?,
        rating_index: row.get(4)?,
        hits: json_column(row, 5)?,
        score: row.get(6)?,
        feedback: row.get(7)?,
        search_duration_ms: search_ms.max(0) as u64,
        judge_duration_ms: judge_ms.max(0) as u64,
        metadata: json_column(row, 10)?,
        created_at: row.get(11)?,
    })
}

fn load_battle(conn: &Connection, id: Uuid) -> OrchestratorResult<Option<Battle>> {
    let sql = format!("SELECT {BATTLE_COLUMNS} FROM battles WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], battle_from_row).optional()?)
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

#[async_trait::async_trait]
impl JobStore for SqliteJobStore {
    async fn insert_backend(&self, record: BackendRecord) -> OrchestratorResult<()> {
        self.run("insert_backend", move |conn| {
            conn.execute(
                "INSERT INTO backends (id, label, provider, credentials, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![record.id, record.label, record.provider, record.credentials, record.created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_backend(&self, id: Uuid) -> OrchestratorResult<Option<BackendRecord>> {
        self.run("get_backend", move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, label, provider, credentials, created_at FROM backends WHERE id = ?1",
                    params![id],
                    backend_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn list_backends(&self) -> OrchestratorResult<Vec<BackendRecord>> {
        self.run("list_backends", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, label, provider, credentials, created_at FROM backends ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map([], backend_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn delete_backend(&self, id: Uuid) -> OrchestratorResult<bool> {
        self.run("delete_backend", move |conn| {
            Ok(conn.execute("DELETE FROM backends WHERE id = ?1", params![id])? > 0)
        })
        .await
    }

    async fn create_battle(&self, battle: Battle, queries: Vec<BattleQuery>) -> OrchestratorResult<()> {
        let config1 = serde_json::to_string(&battle.config1)?;
        let config2 = serde_json::to_string(&battle.config2)?;
        let metadata = serde_json::to_string(&battle.metadata)?;

        self.run("create_battle", move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO battles ({BATTLE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    battle.id,
                    battle.label,
                    battle.backend_ref1,
                    battle.backend_ref2,
                    config1,
                    config2,
                    battle.queries,
                    battle.rating_count,
                    battle.status.as_str(),
                    battle.error,
                    battle.mean_score1,
                    battle.mean_score2,
                    battle.created_at,
                    battle.queued_at,
                    battle.completed_at,
                    metadata,
                    battle.owner,
                    battle.is_demo,
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO battle_queries (id, battle_id, position, query_text, error, rating_count, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for (position, query) in queries.iter().enumerate() {
                    stmt.execute(params![
                        query.id,
                        query.battle_id,
                        position as i64,
                        query.query_text,
                        query.error,
                        query.rating_count,
                        query.created_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_battle(&self, id: Uuid) -> OrchestratorResult<Option<Battle>> {
        self.run("get_battle", move |conn| load_battle(conn, id)).await
    }

    async fn list_battles(&self, filter: BattleFilter) -> OrchestratorResult<Vec<Battle>> {
        self.run("list_battles", move |conn| {
            // Demo listings ignore the owner
            let sql = format!(
                "SELECT {BATTLE_COLUMNS} FROM battles \
                 WHERE (?1 IS NULL OR is_demo = ?1) AND (?1 = 1 OR ?2 IS NULL OR owner = ?2) \
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![filter.is_demo, filter.owner], battle_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn list_unfinished_battles(&self) -> OrchestratorResult<Vec<Battle>> {
        self.run("list_unfinished_battles", |conn| {
            let sql = format!(
                "SELECT {BATTLE_COLUMNS} FROM battles WHERE status IN ('pending', 'in_progress') ORDER BY queued_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], battle_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn apply_transition(&self, id: Uuid, transition: BattleTransition) -> OrchestratorResult<Battle> {
        self.run("apply_transition", move |conn| {
            let tx = conn.transaction()?;
            let mut battle = load_battle(&tx, id)?.ok_or(OrchestratorError::BattleNotFound { battle_id: id })?;
            if !transition.permits(battle.status) {
                return Err(transition.rejection(&battle));
            }
            let from = battle.status;
            transition.apply_to(&mut battle, Utc::now());

            let updated = tx.execute(
                "UPDATE battles SET status = ?1, error = ?2, mean_score1 = ?3, mean_score2 = ?4, \
                 queued_at = ?5, completed_at = ?6, metadata = ?7 \
                 WHERE id = ?8 AND status = ?9",
                params![
                    battle.status.as_str(),
                    battle.error,
                    battle.mean_score1,
                    battle.mean_score2,
                    battle.queued_at,
                    battle.completed_at,
                    serde_json::to_string(&battle.metadata)?,
                    id,
                    from.as_str(),
                ],
            )?;
            if updated == 0 {
                return Err(OrchestratorError::InvalidTransition {
                    battle_id: id,
                    from,
                    to: transition.target(),
                });
            }

            if transition == BattleTransition::Reset {
                tx.execute("UPDATE battle_queries SET error = NULL WHERE battle_id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(battle)
        })
        .await
    }

    async fn set_demo(&self, id: Uuid, is_demo: bool) -> OrchestratorResult<Battle> {
        self.run("set_demo", move |conn| {
            let updated = conn.execute("UPDATE battles SET is_demo = ?1 WHERE id = ?2", params![is_demo, id])?;
            if updated == 0 {
                return Err(OrchestratorError::BattleNotFound { battle_id: id });
            }
            load_battle(conn, id)?.ok_or(OrchestratorError::BattleNotFound { battle_id: id })
        })
        .await
    }

    async fn delete_battle(&self, id: Uuid) -> OrchestratorResult<bool> {
        self.run("delete_battle", move |conn| {
            Ok(conn.execute("DELETE FROM battles WHERE id = ?1", params![id])? > 0)
        })
        .await
    }

    async fn list_queries(&self, battle_id: Uuid) -> OrchestratorResult<Vec<BattleQuery>> {
        self.run("list_queries", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, battle_id, query_text, error, rating_count, created_at \
                 FROM battle_queries WHERE battle_id = ?1 ORDER BY position",
            )?;
            let rows = stmt.query_map(params![battle_id], query_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn set_query_error(&self, query_id: Uuid, error: Option<String>) -> OrchestratorResult<()> {
        self.run("set_query_error", move |conn| {
            let updated = conn.execute(
                "UPDATE battle_queries SET error = ?1 WHERE id = ?2",
                params![error, query_id],
            )?;
            if updated == 0 {
                return Err(OrchestratorError::storage("set_query_error", format!("query {query_id} not found")));
            }
            Ok(())
        })
        .await
    }

    async fn insert_result(&self, record: ResultRecord) -> OrchestratorResult<()> {
        let hits = serde_json::to_string(&record.hits)?;
        let metadata = serde_json::to_string(&record.metadata)?;

        self.run("insert_result", move |conn| {
            let inserted = conn.execute(
                "INSERT INTO results (id, query_id, backend_id, config_index, rating_index, hits, score, feedback, \
                 search_duration_ms, judge_duration_ms, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id,
                    record.query_id,
                    record.backend_id,
                    record.config_index,
                    record.rating_index,
                    hits,
                    record.score,
                    record.feedback,
                    record.search_duration_ms as i64,
                    record.judge_duration_ms as i64,
                    metadata,
                    record.created_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(OrchestratorError::DuplicateResult {
                    query_id: record.query_id,
                    config_index: record.config_index,
                    rating_index: record.rating_index,
                }),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn delete_results_for_battle(&self, battle_id: Uuid) -> OrchestratorResult<usize> {
        self.run("delete_results_for_battle", move |conn| {
            Ok(conn.execute(
                "DELETE FROM results WHERE query_id IN (SELECT id FROM battle_queries WHERE battle_id = ?1)",
                params![battle_id],
            )?)
        })
        .await
    }

    async fn list_results(&self, battle_id: Uuid) -> OrchestratorResult<Vec<ResultRecord>> {
        self.run("list_results", move |conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM results r \
                 JOIN battle_queries q ON r.query_id = q.id \
                 WHERE q.battle_id = ?1 \
                 ORDER BY q.position, r.config_index, r.rating_index"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![battle_id], result_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}
