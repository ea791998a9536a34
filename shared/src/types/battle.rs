//! Battle, query and result records

use crate::errors::SharedError;
use crate::types::search::{SearchHit, VersionedConfig};
use crate::types::usage::JudgeUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Marker score for "no valid rating"; excluded from every statistic
pub const SENTINEL_SCORE: f64 = -1.0;

/// Lowest and highest score a judge may assign
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// True when a score is a real judge rating rather than the sentinel
pub fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Which side of a battle a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::First, Side::Second];

    /// Persisted `configIndex` value (1 or 2)
    pub fn config_index(self) -> u8 {
        match self {
            Side::First => 1,
            Side::Second => 2,
        }
    }

    pub fn from_config_index(index: u8) -> Option<Side> {
        match index {
            1 => Some(Side::First),
            2 => Some(Side::Second),
            _ => None,
        }
    }
}

/// Battle lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BattleStatus {
    /// Regular lifecycle edges: pending -> in_progress -> {completed, failed},
    /// and {completed, failed} -> pending through an explicit retry.
    pub fn can_transition_to(self, next: BattleStatus) -> bool {
        use BattleStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Pending)
                | (Failed, Pending)
        )
    }

    /// Pending or in progress
    pub fn is_unfinished(self) -> bool {
        matches!(self, BattleStatus::Pending | BattleStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BattleStatus::Pending => "pending",
            BattleStatus::InProgress => "in_progress",
            BattleStatus::Completed => "completed",
            BattleStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BattleStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BattleStatus::Pending),
            "in_progress" => Ok(BattleStatus::InProgress),
            "completed" => Ok(BattleStatus::Completed),
            "failed" => Ok(BattleStatus::Failed),
            other => Err(SharedError::UnknownStatus { value: other.to_string() }),
        }
    }
}

/// Aggregate judge usage stored on a battle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleMetadata {
    pub usage: JudgeUsage,
    /// Number of judge calls that contributed to `usage`
    #[serde(default)]
    pub evaluations: u32,
}

/// One comparative evaluation job between two search backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    pub id: Uuid,
    pub label: String,
    pub backend_ref1: Uuid,
    pub backend_ref2: Uuid,
    pub config1: VersionedConfig,
    pub config2: VersionedConfig,
    /// Raw newline-delimited query text as submitted
    pub queries: String,
    pub rating_count: u32,
    pub status: BattleStatus,
    pub error: Option<String>,
    pub mean_score1: Option<f64>,
    pub mean_score2: Option<f64>,
    pub created_at: DateTime<Utc>,
    /// Reset whenever the battle re-enters pending; staleness is measured from here
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: BattleMetadata,
    pub owner: Option<String>,
    pub is_demo: bool,
}

impl Battle {
    pub fn backend_ref(&self, side: Side) -> Uuid {
        match side {
            Side::First => self.backend_ref1,
            Side::Second => self.backend_ref2,
        }
    }

    pub fn config(&self, side: Side) -> &VersionedConfig {
        match side {
            Side::First => &self.config1,
            Side::Second => &self.config2,
        }
    }

    pub fn mean_score(&self, side: Side) -> Option<f64> {
        match side {
            Side::First => self.mean_score1,
            Side::Second => self.mean_score2,
        }
    }

    /// Owner check used by the read side; a battle without owner is visible to all
    pub fn is_visible_to(&self, owner: Option<&str>) -> bool {
        match (&self.owner, owner) {
            (None, _) => true,
            (Some(stored), Some(requested)) => stored == requested,
            (Some(_), None) => false,
        }
    }
}

/// One query of a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleQuery {
    pub id: Uuid,
    pub battle_id: Uuid,
    pub query_text: String,
    pub error: Option<String>,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

impl BattleQuery {
    pub fn new(battle_id: Uuid, query_text: impl Into<String>, rating_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            battle_id,
            query_text: query_text.into(),
            error: None,
            rating_count,
            created_at: Utc::now(),
        }
    }
}

/// One judged search result for (query, side, rating attempt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: Uuid,
    pub query_id: Uuid,
    pub backend_id: Uuid,
    pub config_index: u8,
    pub rating_index: u32,
    pub hits: Vec<SearchHit>,
    pub score: f64,
    pub feedback: String,
    pub search_duration_ms: u64,
    pub judge_duration_ms: u64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn side(&self) -> Option<Side> {
        Side::from_config_index(self.config_index)
    }
}

/// Split raw query text into trimmed, non-blank lines
pub fn split_query_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
