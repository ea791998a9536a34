//! Per-query and per-battle score rollups

use shared::{is_valid_score, BattleMetadata, JudgeUsage, Side};

use super::stats::mean;
use crate::traits::Evaluation;

/// Valid scores and judge usage collected for one query across its rating attempts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryScores {
    pub side1: Vec<f64>,
    pub side2: Vec<f64>,
    pub usage: JudgeUsage,
    pub evaluations: u32,
    /// The query hit a backend or judge error; its scores are excluded
    pub failed: bool,
}

impl QueryScores {
    /// Account one judging pass; sentinel scores are not kept
    pub fn record(&mut self, evaluation: &Evaluation) {
        if is_valid_score(evaluation.side_a.score) {
            self.side1.push(evaluation.side_a.score);
        }
        if is_valid_score(evaluation.side_b.score) {
            self.side2.push(evaluation.side_b.score);
        }
        self.usage += evaluation.usage;
        self.evaluations += 1;
    }

    /// Mark the query failed; judge usage already spent still counts
    pub fn fail(&mut self) {
        self.failed = true;
        self.side1.clear();
        self.side2.clear();
    }

    pub fn scores(&self, side: Side) -> &[f64] {
        match side {
            Side::First => &self.side1,
            Side::Second => &self.side2,
        }
    }

    /// Mean of this side's valid scores, 0 if none
    pub fn mean(&self, side: Side) -> f64 {
        mean(self.scores(side))
    }

    pub fn has_valid(&self, side: Side) -> bool {
        !self.failed && !self.scores(side).is_empty()
    }
}

/// Battle-level aggregates written on completion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BattleRollup {
    pub mean_score1: f64,
    pub mean_score2: f64,
    pub metadata: BattleMetadata,
}

fn side_mean(queries: &[QueryScores], side: Side) -> f64 {
    let per_query: Vec<f64> = queries
        .iter()
        .filter(|q| q.has_valid(side))
        .map(|q| q.mean(side))
        .collect();
    mean(&per_query)
}

/// Mean of per-query means over queries with at least one valid score; usage summed over every attempt
pub fn rollup(queries: &[QueryScores]) -> BattleRollup {
    BattleRollup {
        mean_score1: side_mean(queries, Side::First),
        mean_score2: side_mean(queries, Side::Second),
        metadata: BattleMetadata {
            usage: queries.iter().map(|q| q.usage).sum(),
            evaluations: queries.iter().map(|q| q.evaluations).sum(),
        },
    }
}
