//! Webserver state management
//!
//! Shared by every handler: the orchestrator that owns the store and the
//! provider services, and the dispatch handle feeding the background worker.

use std::sync::Arc;
use std::time::Instant;

use orchestrator::{BackendFactory, BattleOrchestrator, DispatchHandle, Judge, JobStore};

/// Core webserver state
pub struct AppState<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    pub orchestrator: Arc<BattleOrchestrator<S, F, J>>,
    pub dispatch: DispatchHandle,
    pub server_start_time: Instant,
}

impl<S, F, J> AppState<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    pub fn new(orchestrator: Arc<BattleOrchestrator<S, F, J>>, dispatch: DispatchHandle) -> Self {
        Self {
            orchestrator,
            dispatch,
            server_start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.server_start_time.elapsed().as_secs()
    }
}

// Derived Clone would demand Clone on the service types
impl<S, F, J> Clone for AppState<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            dispatch: self.dispatch.clone(),
            server_start_time: self.server_start_time,
        }
    }
}
