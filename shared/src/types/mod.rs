//! Core types used throughout the search battle system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub mod battle;
pub mod search;
pub mod usage;

pub use battle::*;
pub use search::*;
pub use usage::*;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Fallback identity for library code running without an initialized binary (tests, embedding)
static DEFAULT_PROCESS_ID: ProcessId = ProcessId::Orchestrator;

/// Process identifier for either binary in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// Orchestrator CLI process
    Orchestrator,
    /// WebServer process hosting the HTTP API and background worker
    WebServer,
}

impl ProcessId {
    /// Initialize the global process ID for orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Initialize the global process ID for webserver
    pub fn init_webserver() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::WebServer)
    }

    /// Get the global process ID, falling back to the orchestrator identity
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get().unwrap_or(&DEFAULT_PROCESS_ID)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::WebServer => write!(f, "webserver"),
        }
    }
}
