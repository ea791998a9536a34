//! Main entry point for the orchestrator binary
//!
//! Runs battles from the command line against the same store the webserver
//! uses. Processing happens in this process; the command waits for it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use orchestrator::{
    services::{BackendRegistry, LlmJudge, SqliteJobStore},
    BattleOrchestrator, OrchestratorError, OrchestratorResult, Settings,
};
use shared::{
    logging, process_debug, process_info, BattleFilter, JobRecord, JobSubmission, NewBackend, ProcessId,
    VersionedConfig,
};

/// Orchestrator for comparative search backend battles
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Runs search backend battles scored by an LLM judge")]
pub struct Args {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a search backend
    AddBackend {
        #[arg(long)]
        label: String,
        /// Provider key (upstash_search, algolia)
        #[arg(long)]
        provider: String,
        /// File holding the versioned JSON credential document
        #[arg(long)]
        credentials: Option<PathBuf>,
    },
    /// List registered backends
    Backends,
    /// Create a battle and process it
    Run {
        #[arg(long)]
        label: String,
        #[arg(long)]
        backend1: Uuid,
        #[arg(long)]
        backend2: Uuid,
        /// Side 1 config body as JSON
        #[arg(long)]
        config1: Option<String>,
        /// Side 2 config body as JSON
        #[arg(long)]
        config2: Option<String>,
        /// File with one query per line
        #[arg(long)]
        queries: PathBuf,
        #[arg(long, default_value_t = 1)]
        rating_count: u32,
    },
    /// Reset a finished battle and process it again
    Retry {
        battle_id: Uuid,
    },
    /// Show a battle with its per-query results
    Show {
        battle_id: Uuid,
    },
    /// List battles, newest first
    List {
        /// Only demo battles
        #[arg(long)]
        demo: bool,
    },
    /// Fail stale pending or running battles once
    Sweep,
}

fn parse_config(raw: Option<String>) -> OrchestratorResult<VersionedConfig> {
    match raw {
        Some(raw) => Ok(VersionedConfig::new(serde_json::from_str(&raw)?)),
        None => Ok(VersionedConfig::default()),
    }
}

fn read_file(path: &PathBuf) -> OrchestratorResult<String> {
    std::fs::read_to_string(path).map_err(|e| OrchestratorError::config(format!("{}: {e}", path.display())))
}

fn print_json<T: Serialize>(value: &T) -> OrchestratorResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    // Load .env before clap reads env-backed flags
    let _ = dotenv::dotenv();

    // Parse command line arguments
    let args = Args::parse();
    args.settings.validate()?;

    // Initialize process ID singleton for orchestrator
    ProcessId::init_orchestrator();
    logging::init_tracing_with_level(Some(&args.settings.log_level));
    logging::log_startup(ProcessId::current(), "orchestrator CLI");

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
    process_debug!(ProcessId::current(), "💾 Store: {}", args.settings.database);

    // Create orchestrator with dependency injection
    let orchestrator = BattleOrchestrator::new(store, registry, judge);

    match args.command {
        Command::AddBackend {
            label,
            provider,
            credentials,
        } => {
            let credentials = credentials.as_ref().map(read_file).transpose()?;
            let record = orchestrator
                .register_backend(NewBackend {
                    label,
                    provider,
                    credentials,
                })
                .await?;
            print_json(&shared::BackendView::from(&record))?;
        }
        Command::Backends => {
            let views: Vec<shared::BackendView> = orchestrator.list_backends().await?.iter().map(Into::into).collect();
            print_json(&views)?;
        }
        Command::Run {
            label,
            backend1,
            backend2,
            config1,
            config2,
            queries,
            rating_count,
        } => {
            let submission = JobSubmission {
                label,
                backend_ref1: backend1,
                backend_ref2: backend2,
                config1: parse_config(config1)?,
                config2: parse_config(config2)?,
                queries: read_file(&queries)?,
                rating_count,
                owner: None,
            };
            let (_, ticket) = orchestrator.create_job(submission).await?;
            let battle = orchestrator.process_job(ticket.battle_id()).await?;
            print_json(&JobRecord::from(&battle))?;
        }
        Command::Retry { battle_id } => {
            let (_, ticket) = orchestrator.retry_job(battle_id).await?;
            let battle = orchestrator.process_job(ticket.battle_id()).await?;
            print_json(&JobRecord::from(&battle))?;
        }
        Command::Show { battle_id } => {
            let battle = orchestrator.get_job(battle_id).await?;
            let queries = orchestrator.query_results(battle_id).await?;
            print_json(&serde_json::json!({
                "battle": JobRecord::from(&battle),
                "queries": queries,
            }))?;
        }
        Command::List { demo } => {
            let filter = if demo { BattleFilter::demos() } else { BattleFilter::default() };
            let records: Vec<JobRecord> = orchestrator.list_jobs(filter).await?.iter().map(Into::into).collect();
            print_json(&records)?;
        }
        Command::Sweep => {
            let swept = orchestrator.sweep_stale_jobs(args.settings.stale_after()).await?;
            print_json(&swept)?;
        }
    }

    logging::log_shutdown(ProcessId::current(), "command finished");
    Ok(())
}
