//! REST API handlers for search backend registration

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use shared::{BackendView, NewBackend};
use uuid::Uuid;

use orchestrator::{BackendFactory, Judge, JobStore};

use crate::error::WebServerResult;
use crate::state::AppState;

/// POST /api/backends
pub async fn create_backend<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    payload: Result<Json<NewBackend>, JsonRejection>,
) -> WebServerResult<(StatusCode, Json<BackendView>)>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let Json(request) = payload?;
    let record = state.orchestrator.register_backend(request).await?;
    Ok((StatusCode::CREATED, Json(BackendView::from(&record))))
}

/// GET /api/backends
pub async fn list_backends<S, F, J>(State(state): State<AppState<S, F, J>>) -> WebServerResult<Json<Vec<BackendView>>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let views = state.orchestrator.list_backends().await?.iter().map(BackendView::from).collect();
    Ok(Json(views))
}

/// DELETE /api/backends/:id
pub async fn delete_backend<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    Path(backend_id): Path<Uuid>,
) -> WebServerResult<Json<Value>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    state.orchestrator.delete_backend(backend_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Backend {backend_id} deleted"),
    })))
}
