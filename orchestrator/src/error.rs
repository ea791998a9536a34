//! Orchestrator-specific error types

use shared::{BattleStatus, SharedError};
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification used for propagation decisions and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, missing or incompatible credentials, unsupported schema version
    Validation,
    /// A search call failed
    Backend,
    /// A judge call failed outright
    Judge,
    /// The job store failed; fails the whole battle
    Persistence,
    /// Sweeper-only staleness failure
    Timeout,
    /// The battle is busy or the requested transition is not allowed
    Conflict,
    NotFound,
    /// The background job queue is gone
    Queue,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid battle request: {message}")]
    InvalidRequest { message: String },

    #[error("Battle {battle_id} not found")]
    BattleNotFound { battle_id: Uuid },

    #[error("Backend {backend_id} not found")]
    BackendNotFound { backend_id: Uuid },

    #[error("Credentials not found for backend {backend_id}")]
    CredentialsMissing { backend_id: Uuid },

    #[error("Backend {backend_id} uses the legacy credential format; re-save its credentials as versioned JSON")]
    LegacyCredentials { backend_id: Uuid },

    #[error("Unsupported credential version {version} for backend {backend_id}")]
    UnsupportedCredentialVersion { backend_id: Uuid, version: u64 },

    #[error("Invalid {provider} credentials: {message}")]
    InvalidCredentials { provider: String, message: String },

    #[error("Unsupported config version {version} for {provider}")]
    UnsupportedConfigVersion { provider: String, version: u32 },

    #[error("Invalid {provider} config: {message}")]
    InvalidConfig { provider: String, message: String },

    #[error("Unknown search provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("{provider} search failed: {message}")]
    SearchFailed { provider: String, message: String },

    #[error("Judge request failed: {message}")]
    JudgeFailed { message: String },

    #[error("Storage operation failed: {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error("Result already recorded for query {query_id} (config {config_index}, rating {rating_index})")]
    DuplicateResult {
        query_id: Uuid,
        config_index: u8,
        rating_index: u32,
    },

    #[error("Battle {battle_id} is already in progress")]
    AlreadyInProgress { battle_id: Uuid },

    #[error("Battle {battle_id} cannot move from {from} to {to}")]
    InvalidTransition {
        battle_id: Uuid,
        from: BattleStatus,
        to: BattleStatus,
    },

    #[error("Battle timed out")]
    TimedOut,

    #[error("Battle queue is closed")]
    QueueClosed,

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        OrchestratorError::InvalidRequest { message: message.into() }
    }

    pub fn config(field: impl Into<String>) -> Self {
        OrchestratorError::ConfigurationError { field: field.into() }
    }

    pub fn storage(operation: impl Into<String>, error: impl std::fmt::Display) -> Self {
        OrchestratorError::Storage {
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    pub fn search(provider: impl Into<String>, error: impl std::fmt::Display) -> Self {
        OrchestratorError::SearchFailed {
            provider: provider.into(),
            message: error.to_string(),
        }
    }

    pub fn judge(error: impl std::fmt::Display) -> Self {
        OrchestratorError::JudgeFailed { message: error.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        use OrchestratorError::*;
        match self {
            InvalidRequest { .. }
            | CredentialsMissing { .. }
            | LegacyCredentials { .. }
            | UnsupportedCredentialVersion { .. }
            | InvalidCredentials { .. }
            | UnsupportedConfigVersion { .. }
            | InvalidConfig { .. }
            | UnknownProvider { .. }
            | ConfigurationError { .. }
            | JsonError(_) => ErrorKind::Validation,
            BattleNotFound { .. } | BackendNotFound { .. } => ErrorKind::NotFound,
            SearchFailed { .. } => ErrorKind::Backend,
            JudgeFailed { .. } => ErrorKind::Judge,
            Storage { .. } | DuplicateResult { .. } | SharedError(_) => ErrorKind::Persistence,
            AlreadyInProgress { .. } | InvalidTransition { .. } => ErrorKind::Conflict,
            TimedOut => ErrorKind::Timeout,
            QueueClosed => ErrorKind::Queue,
        }
    }

    /// Errors that stay inside one query instead of failing the battle
    pub fn is_query_scoped(&self) -> bool {
        matches!(self.kind(), ErrorKind::Backend | ErrorKind::Judge)
    }
}

impl From<rusqlite::Error> for OrchestratorError {
    fn from(error: rusqlite::Error) -> Self {
        OrchestratorError::storage("sqlite", error)
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
