//! Shared types for the search battle system
//!
//! Holds the domain records persisted by the job store, the request and
//! view shapes exchanged between the webserver and the orchestrator, and the
//! process-aware logging helpers used by both binaries.

pub mod types;
pub mod errors;
pub mod messages;
pub mod logging;

pub use types::*;
pub use errors::*;

pub use messages::{
    // Job submission and listing
    JobSubmission, JobRecord, BattleFilter,

    // Per-query drill-down
    QueryView, AttemptView, ScoreSummary,

    // Backend registry management
    NewBackend, BackendView,
};
