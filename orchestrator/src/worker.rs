//! Background job queue and worker
//!
//! Creation and retry hand a battle id to a bounded channel; the worker
//! consumes it and runs `process_job` with a cap on concurrent battles. On
//! shutdown the worker stops taking new ids and waits for in-flight battles.

use std::sync::Arc;

use shared::{logging, process_debug, process_error, process_info, ProcessId};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::BattleOrchestrator;
use crate::traits::{BackendFactory, Judge, JobStore};

/// Bounded queue of battle ids awaiting processing
pub struct JobQueue;

impl JobQueue {
    /// Create the sending and receiving halves of a queue
    pub fn bounded(capacity: usize) -> (DispatchHandle, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (DispatchHandle { tx }, JobReceiver { rx })
    }
}

/// Cloneable sender for battle ids
#[derive(Clone, Debug)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Uuid>,
}

impl DispatchHandle {
    /// Enqueue a battle; waits while the queue is full
    pub async fn dispatch(&self, battle_id: Uuid) -> OrchestratorResult<()> {
        self.tx
            .send(battle_id)
            .await
            .map_err(|_| OrchestratorError::QueueClosed)?;
        process_debug!(ProcessId::current(), "📥 Battle {} queued", battle_id);
        Ok(())
    }
}

/// Receiving half consumed by the worker
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Uuid>,
}

impl JobReceiver {
    pub async fn recv(&mut self) -> Option<Uuid> {
        self.rx.recv().await
    }
}

/// Consumes queued battle ids and processes them
pub struct Worker<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    orchestrator: Arc<BattleOrchestrator<S, F, J>>,
    receiver: JobReceiver,
    permits: Arc<Semaphore>,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<S, F, J> Worker<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    pub fn new(orchestrator: Arc<BattleOrchestrator<S, F, J>>, receiver: JobReceiver, max_concurrent: usize) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            orchestrator,
            receiver,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get shutdown sender for external shutdown triggering
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until shutdown is signalled or every dispatch handle is dropped
    pub async fn run(mut self) -> OrchestratorResult<()> {
        process_info!(ProcessId::current(), "👷 Battle worker started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                job = self.receiver.recv() => {
                    let Some(battle_id) = job else {
                        process_debug!(ProcessId::current(), "Job queue closed");
                        break;
                    };
                    let permit = Arc::clone(&self.permits)
                        .acquire_owned()
                        .await
                        .map_err(|_| OrchestratorError::QueueClosed)?;
                    let orchestrator = Arc::clone(&self.orchestrator);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        if let Err(e) = orchestrator.process_job(battle_id).await {
                            logging::log_error(ProcessId::current(), &format!("Processing battle {battle_id}"), &e);
                        }
                    });
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        process_error!(ProcessId::current(), "❌ Battle task aborted: {}", e);
                    }
                },
                _ = self.shutdown_rx.recv() => {
                    logging::log_shutdown(ProcessId::current(), "battle worker received shutdown signal");
                    break;
                },
            }
        }

        if !in_flight.is_empty() {
            process_info!(ProcessId::current(), "⏳ Waiting for {} in-flight battles", in_flight.len());
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                process_error!(ProcessId::current(), "❌ Battle task aborted: {}", e);
            }
        }

        process_info!(ProcessId::current(), "👷 Battle worker stopped");
        Ok(())
    }
}
