//! WebServer-specific error types

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use orchestrator::{ErrorKind, OrchestratorError};
use serde_json::json;
use shared::{logging, ProcessId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebServerError {
    #[error("Invalid request format: {details}")]
    InvalidRequest { details: String },

    #[error("Battle {battle_id} not found")]
    BattleNotFound { battle_id: uuid::Uuid },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Server startup error: {0}")]
    ServerStartup(String),
}

impl WebServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebServerError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            WebServerError::BattleNotFound { .. } => StatusCode::NOT_FOUND,
            WebServerError::Orchestrator(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            WebServerError::IoError(_) | WebServerError::ServerStartup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for WebServerError {
    fn from(rejection: JsonRejection) -> Self {
        WebServerError::InvalidRequest {
            details: rejection.body_text(),
        }
    }
}

impl IntoResponse for WebServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            logging::log_error(ProcessId::current(), "Request failed", &self);
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type WebServerResult<T> = Result<T, WebServerError>;
