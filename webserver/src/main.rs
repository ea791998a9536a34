//! WebServer entry point
//!
//! Owns the process lifecycle: opens the store, builds the provider registry
//! and judge, spawns the battle worker and the stale job sweeper, serves the
//! HTTP API and shuts everything down on Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use shared::{logging, process_error, process_info, ProcessId};
use tokio::signal;
use tokio::sync::watch;

use orchestrator::{
    services::{BackendRegistry, LlmJudge, SqliteJobStore},
    BattleOrchestrator, JobQueue, Settings, StaleJobSweeper, Worker,
};
use webserver::{WebServer, WebServerResult};

/// Command line arguments for the HTTP API
#[derive(Parser, Debug)]
#[command(name = "webserver")]
#[command(about = "HTTP API for running search backend battles")]
struct Args {
    /// Port for the HTTP API
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> WebServerResult<()> {
    // Load .env before clap reads env-backed flags
    let _ = dotenv::dotenv();

    let args = Args::parse();
    args.settings.validate()?;

    // Initialize process ID singleton for webserver
    ProcessId::init_webserver();
    logging::init_tracing_with_level(Some(&args.settings.log_level));
    logging::log_startup(ProcessId::current(), &format!("HTTP API on port {}", args.port));

    // Initialize services
    let client = reqwest::Client::new();
    let store = SqliteJobStore::open_location(&args.settings.database)?;
    let registry = BackendRegistry::with_defaults(client.clone());
    let judge = LlmJudge::new(client, args.settings.judge_settings());
    if !judge.is_available() {
        process_info!(
            ProcessId::current(),
            "⚖️ No judge API key configured; ratings will be recorded as unavailable"
        );
    }

    let orchestrator = Arc::new(BattleOrchestrator::new(store, registry, judge));

    // Background processing
    let (dispatch, receiver) = JobQueue::bounded(args.settings.queue_capacity);
    let worker = Worker::new(Arc::clone(&orchestrator), receiver, args.settings.max_concurrent_battles);
    let worker_shutdown = worker.get_shutdown_sender();
    let sweeper = StaleJobSweeper::new(
        Arc::clone(&orchestrator),
        args.settings.stale_after(),
        args.settings.sweep_interval(),
    );
    let sweeper_shutdown = sweeper.get_shutdown_sender();

    let worker_task = tokio::spawn(worker.run());
    let sweeper_task = tokio::spawn(sweeper.run());

    // Ctrl+C fans out to the HTTP server and both background tasks
    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            logging::log_shutdown(ProcessId::current(), "Ctrl+C received");
            let _ = stop_tx.send(true);
            let _ = worker_shutdown.send(()).await;
            let _ = sweeper_shutdown.send(()).await;
        }
    });

    let server = WebServer::new(orchestrator, dispatch);
    let bind_address = SocketAddr::new(args.host, args.port);
    let result = server
        .run(bind_address, async move {
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
        })
        .await;

    if let Err(e) = &result {
        logging::log_error(ProcessId::current(), "HTTP server", e);
    }

    // The router holds the last dispatch handle; dropping it closes the queue
    drop(server);
    match worker_task.await {
        Ok(Err(e)) => logging::log_error(ProcessId::current(), "Battle worker", &e),
        Err(e) => process_error!(ProcessId::current(), "❌ Battle worker task failed: {}", e),
        Ok(Ok(())) => {}
    }
    sweeper_task.abort();

    if result.is_ok() {
        logging::log_success(ProcessId::current(), "WebServer shut down cleanly");
    }
    result
}
