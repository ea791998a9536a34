//! Runtime settings shared by the orchestrator CLI and the webserver
//!
//! Flattened into each binary's clap `Args`. Every flag can also come from
//! the environment, which `dotenv` populates from a `.env` file at startup.

use std::time::Duration;

use clap::Args;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::judge::{
    JudgeSettings, DEFAULT_BASE_URL, DEFAULT_INPUT_COST_PER_MTOK, DEFAULT_MODEL, DEFAULT_OUTPUT_COST_PER_MTOK,
};

/// Longest stale threshold accepted: 30 days
pub const MAX_STALE_AFTER_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct Settings {
    /// SQLite database file, or :memory: for an ephemeral store
    #[arg(long, env = "BATTLE_DATABASE", default_value = "battles.db")]
    pub database: String,

    /// Fail pending or running battles queued longer than this many seconds
    #[arg(long, env = "BATTLE_STALE_AFTER_SECS", default_value_t = 600)]
    pub stale_after_secs: u64,

    /// Seconds between stale job sweeps
    #[arg(long, env = "BATTLE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Battles that may wait in the job queue
    #[arg(long, env = "BATTLE_QUEUE_CAPACITY", default_value_t = 64)]
    pub queue_capacity: usize,

    /// Battles processed at the same time
    #[arg(long, env = "BATTLE_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent_battles: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Judge API key; without one every rating is recorded as unavailable
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub judge_api_key: Option<String>,

    /// Judge model name
    #[arg(long, env = "JUDGE_MODEL", default_value = DEFAULT_MODEL)]
    pub judge_model: String,

    /// Judge API base URL
    #[arg(long, env = "JUDGE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub judge_base_url: String,

    /// Judge input price in USD per million tokens
    #[arg(long, default_value_t = DEFAULT_INPUT_COST_PER_MTOK)]
    pub judge_input_cost_per_mtok: f64,

    /// Judge output price in USD per million tokens
    #[arg(long, default_value_t = DEFAULT_OUTPUT_COST_PER_MTOK)]
    pub judge_output_cost_per_mtok: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: "battles.db".to_string(),
            stale_after_secs: 600,
            sweep_interval_secs: 60,
            queue_capacity: 64,
            max_concurrent_battles: 4,
            log_level: "info".to_string(),
            judge_api_key: None,
            judge_model: DEFAULT_MODEL.to_string(),
            judge_base_url: DEFAULT_BASE_URL.to_string(),
            judge_input_cost_per_mtok: DEFAULT_INPUT_COST_PER_MTOK,
            judge_output_cost_per_mtok: DEFAULT_OUTPUT_COST_PER_MTOK,
        }
    }
}

impl Settings {
    /// Reject values that would stall or misprice the engine
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.database.trim().is_empty() {
            return Err(OrchestratorError::config("database must not be empty"));
        }
        if self.stale_after_secs == 0 {
            return Err(OrchestratorError::config("stale-after-secs must be at least 1"));
        }
        if self.stale_after_secs > MAX_STALE_AFTER_SECS {
            return Err(OrchestratorError::config(format!(
                "stale-after-secs must be at most {MAX_STALE_AFTER_SECS}"
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(OrchestratorError::config("sweep-interval-secs must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(OrchestratorError::config("queue-capacity must be at least 1"));
        }
        if self.max_concurrent_battles == 0 {
            return Err(OrchestratorError::config("max-concurrent-battles must be at least 1"));
        }
        if self.judge_input_cost_per_mtok < 0.0 || self.judge_output_cost_per_mtok < 0.0 {
            return Err(OrchestratorError::config("judge prices must not be negative"));
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn judge_settings(&self) -> JudgeSettings {
        JudgeSettings {
            api_key: self.judge_api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.judge_model.clone(),
            base_url: self.judge_base_url.clone(),
            input_cost_per_mtok: self.judge_input_cost_per_mtok,
            output_cost_per_mtok: self.judge_output_cost_per_mtok,
        }
    }
}
