//! Orchestrator library for running search backend battles
//!
//! This library runs comparative evaluations between two pluggable search
//! backends: it fans every query out to both sides, has a judge score the two
//! result sets, persists one result per side and rating attempt, and rolls the
//! scores up into per-battle means. Background processing, retry and stale
//! job sweeping are built on the same injected services.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod sweeper;
pub mod traits;
pub mod worker;

// Re-export commonly used types
pub use config::Settings;
pub use core::{BattleRollup, BattleTransition, QueryScores};
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use orchestrator::{BattleOrchestrator, JobTicket};
pub use sweeper::StaleJobSweeper;
pub use traits::{BackendFactory, Evaluation, Judge, JobStore, SearchBackend, SideVerdict};
pub use traits::{MockBackendFactory, MockJobStore, MockJudge, MockSearchBackend};
pub use worker::{DispatchHandle, JobQueue, JobReceiver, Worker};
