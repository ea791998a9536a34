//! Core business logic modules
//!
//! This module contains pure battle logic with no I/O dependencies:
//! score statistics, per-query and per-battle rollups, judge input
//! preparation and the status transition rules the stores enforce.

pub mod aggregation;
pub mod hits;
pub mod stats;
pub mod transitions;

pub use aggregation::{rollup, BattleRollup, QueryScores};
pub use hits::{dedupe_for_judging, MAX_JUDGED_HITS};
pub use stats::{mean, std_dev, summarize, valid_scores};
pub use transitions::BattleTransition;
