//! Periodic stale job sweeper

use std::sync::Arc;
use std::time::Duration;

use shared::{logging, process_debug, process_info, ProcessId};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::orchestrator::BattleOrchestrator;
use crate::traits::{BackendFactory, Judge, JobStore};

/// Fails battles that stay pending or in progress longer than a threshold
pub struct StaleJobSweeper<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    orchestrator: Arc<BattleOrchestrator<S, F, J>>,
    threshold: Duration,
    every: Duration,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<S, F, J> StaleJobSweeper<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    pub fn new(orchestrator: Arc<BattleOrchestrator<S, F, J>>, threshold: Duration, every: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            orchestrator,
            threshold,
            every,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get shutdown sender for external shutdown triggering
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Sweep once immediately, then on every tick until shutdown
    pub async fn run(mut self) {
        process_info!(
            ProcessId::current(),
            "🧹 Stale job sweeper started (threshold {}s, every {}s)",
            self.threshold.as_secs(),
            self.every.as_secs()
        );

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.orchestrator.sweep_stale_jobs(self.threshold).await {
                        Ok(swept) if swept.is_empty() => {
                            process_debug!(ProcessId::current(), "🧹 No stale battles");
                        }
                        Ok(swept) => {
                            process_info!(ProcessId::current(), "🧹 Timed out {} stale battles", swept.len());
                        }
                        Err(e) => logging::log_error(ProcessId::current(), "Stale job sweep", &e),
                    }
                },
                _ = self.shutdown_rx.recv() => {
                    logging::log_shutdown(ProcessId::current(), "stale job sweeper received shutdown signal");
                    break;
                },
            }
        }
    }
}
