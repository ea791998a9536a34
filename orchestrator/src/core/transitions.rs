//! Battle status transitions
//!
//! Stores apply these conditionally: a transition whose source status is not
//! permitted is rejected instead of overwriting the row.

use chrono::{DateTime, Utc};
use shared::{Battle, BattleMetadata, BattleStatus};

use crate::error::OrchestratorError;

#[derive(Debug, Clone, PartialEq)]
pub enum BattleTransition {
    /// pending -> in_progress
    Start,
    /// in_progress -> completed, writing the aggregates
    Complete {
        mean_score1: f64,
        mean_score2: f64,
        metadata: BattleMetadata,
    },
    /// in_progress -> failed
    Fail { error: String },
    /// {pending, in_progress} -> failed, issued only by the stale job sweeper
    TimeOut,
    /// {completed, failed} -> pending through retry
    Reset,
}

impl BattleTransition {
    pub fn target(&self) -> BattleStatus {
        match self {
            BattleTransition::Start => BattleStatus::InProgress,
            BattleTransition::Complete { .. } => BattleStatus::Completed,
            BattleTransition::Fail { .. } | BattleTransition::TimeOut => BattleStatus::Failed,
            BattleTransition::Reset => BattleStatus::Pending,
        }
    }

    pub fn permits(&self, from: BattleStatus) -> bool {
        match self {
            BattleTransition::TimeOut => from.is_unfinished(),
            other => from.can_transition_to(other.target()),
        }
    }

    /// Rejection for a battle whose current status does not permit this transition
    pub fn rejection(&self, battle: &Battle) -> OrchestratorError {
        if battle.status == BattleStatus::InProgress && matches!(self, BattleTransition::Start | BattleTransition::Reset) {
            return OrchestratorError::AlreadyInProgress { battle_id: battle.id };
        }
        OrchestratorError::InvalidTransition {
            battle_id: battle.id,
            from: battle.status,
            to: self.target(),
        }
    }

    /// Mutate an in-memory battle; callers check `permits` first
    pub fn apply_to(&self, battle: &mut Battle, now: DateTime<Utc>) {
        battle.status = self.target();
        match self {
            BattleTransition::Start => {}
            BattleTransition::Complete {
                mean_score1,
                mean_score2,
                metadata,
            } => {
                battle.mean_score1 = Some(*mean_score1);
                battle.mean_score2 = Some(*mean_score2);
                battle.metadata = *metadata;
                battle.error = None;
                battle.completed_at = Some(now);
            }
            BattleTransition::Fail { error } => {
                battle.error = Some(error.clone());
                battle.completed_at = Some(now);
            }
            BattleTransition::TimeOut => {
                battle.error = Some(OrchestratorError::TimedOut.to_string());
                battle.completed_at = Some(now);
            }
            BattleTransition::Reset => {
                battle.error = None;
                battle.mean_score1 = None;
                battle.mean_score2 = None;
                battle.completed_at = None;
                battle.metadata = BattleMetadata::default();
                battle.queued_at = now;
            }
        }
    }
}
