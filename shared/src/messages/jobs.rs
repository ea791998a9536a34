//! Job submission and job record messages

use crate::types::{Battle, BattleMetadata, BattleStatus, VersionedConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_rating_count() -> u32 {
    1
}

/// Request to create a new battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub label: String,
    pub backend_ref1: Uuid,
    pub backend_ref2: Uuid,
    #[serde(default)]
    pub config1: VersionedConfig,
    #[serde(default)]
    pub config2: VersionedConfig,
    /// Newline-delimited query text
    pub queries: String,
    #[serde(default = "default_rating_count")]
    pub rating_count: u32,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Public view of a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub label: String,
    pub status: BattleStatus,
    pub backend_ref1: Uuid,
    pub backend_ref2: Uuid,
    pub rating_count: u32,
    pub mean_score1: Option<f64>,
    pub mean_score2: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: BattleMetadata,
    pub is_demo: bool,
}

impl From<&Battle> for JobRecord {
    fn from(battle: &Battle) -> Self {
        Self {
            id: battle.id,
            label: battle.label.clone(),
            status: battle.status,
            backend_ref1: battle.backend_ref1,
            backend_ref2: battle.backend_ref2,
            rating_count: battle.rating_count,
            mean_score1: battle.mean_score1,
            mean_score2: battle.mean_score2,
            error: battle.error.clone(),
            created_at: battle.created_at,
            completed_at: battle.completed_at,
            metadata: battle.metadata,
            is_demo: battle.is_demo,
        }
    }
}

/// Listing filter; demo listings ignore the owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleFilter {
    pub owner: Option<String>,
    pub is_demo: Option<bool>,
}

impl BattleFilter {
    pub fn for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            is_demo: None,
        }
    }

    pub fn demos() -> Self {
        Self {
            owner: None,
            is_demo: Some(true),
        }
    }

    pub fn matches(&self, battle: &Battle) -> bool {
        if let Some(is_demo) = self.is_demo {
            if battle.is_demo != is_demo {
                return false;
            }
            if is_demo {
                return true;
            }
        }
        match &self.owner {
            Some(owner) => battle.owner.as_deref() == Some(owner.as_str()),
            None => true,
        }
    }
}
