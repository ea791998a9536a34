//! REST API handlers for battles
//!
//! A battle created with a session id belongs to that session: other callers
//! get 404 for it, exactly as if it did not exist. Demo battles are readable by
//! everyone but only their owner may change or delete them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{logging, process_info, Battle, BattleFilter, JobRecord, JobSubmission, ProcessId, QueryView};
use uuid::Uuid;

use orchestrator::{BackendFactory, Judge, JobStore};

use crate::error::{WebServerError, WebServerResult};
use crate::state::AppState;
use crate::web::session::Session;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub demo: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoUpdate {
    pub is_demo: bool,
}

/// Load a battle the caller may read
async fn readable_battle<S, F, J>(state: &AppState<S, F, J>, battle_id: Uuid, session: &Session) -> WebServerResult<Battle>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let battle = state.orchestrator.get_job(battle_id).await?;
    if battle.is_demo || battle.is_visible_to(session.owner()) {
        Ok(battle)
    } else {
        Err(WebServerError::BattleNotFound { battle_id })
    }
}

/// Load a battle the caller may modify
async fn owned_battle<S, F, J>(state: &AppState<S, F, J>, battle_id: Uuid, session: &Session) -> WebServerResult<Battle>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let battle = state.orchestrator.get_job(battle_id).await?;
    if battle.is_visible_to(session.owner()) {
        Ok(battle)
    } else {
        Err(WebServerError::BattleNotFound { battle_id })
    }
}

/// Create a battle and queue it for processing - POST /api/battles
pub async fn create_battle<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    payload: Result<Json<JobSubmission>, JsonRejection>,
) -> WebServerResult<(StatusCode, Json<JobRecord>)>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let Json(mut submission) = payload?;
    submission.owner = session.0;

    let (battle, ticket) = state.orchestrator.create_job(submission).await?;
    ticket.submit(&state.dispatch).await?;

    logging::log_progress(
        ProcessId::current(),
        "Battle dispatched",
        &format!("{} '{}'", battle.id, battle.label),
    );
    Ok((StatusCode::CREATED, Json(JobRecord::from(&battle))))
}

/// List battles newest first - GET /api/battles?demo=bool
pub async fn list_battles<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Query(params): Query<ListParams>,
) -> WebServerResult<Json<Vec<JobRecord>>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let demos_only = params.demo == Some(true);
    let filter = BattleFilter {
        owner: session.0.clone(),
        is_demo: params.demo,
    };

    let records = state
        .orchestrator
        .list_jobs(filter)
        .await?
        .iter()
        .filter(|battle| demos_only || battle.is_visible_to(session.owner()))
        .map(JobRecord::from)
        .collect();
    Ok(Json(records))
}

/// GET /api/battles/:id
pub async fn get_battle<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Path(battle_id): Path<Uuid>,
) -> WebServerResult<Json<JobRecord>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let battle = readable_battle(&state, battle_id, &session).await?;
    Ok(Json(JobRecord::from(&battle)))
}

/// Per-query drill-down with every rating attempt - GET /api/battles/:id/queries
pub async fn get_battle_queries<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Path(battle_id): Path<Uuid>,
) -> WebServerResult<Json<Vec<QueryView>>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    readable_battle(&state, battle_id, &session).await?;
    let queries = state.orchestrator.query_results(battle_id).await?;
    Ok(Json(queries))
}

/// Reset a finished battle and queue it again - POST /api/battles/:id/retry
pub async fn retry_battle<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Path(battle_id): Path<Uuid>,
) -> WebServerResult<(StatusCode, Json<JobRecord>)>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    owned_battle(&state, battle_id, &session).await?;

    let (battle, ticket) = state.orchestrator.retry_job(battle_id).await?;
    ticket.submit(&state.dispatch).await?;

    logging::log_progress(ProcessId::current(), "Battle re-dispatched", &battle_id.to_string());
    Ok((StatusCode::ACCEPTED, Json(JobRecord::from(&battle))))
}

/// Toggle the demo flag - PATCH /api/battles/:id
pub async fn update_battle<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Path(battle_id): Path<Uuid>,
    payload: Result<Json<DemoUpdate>, JsonRejection>,
) -> WebServerResult<Json<JobRecord>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let Json(update) = payload?;
    owned_battle(&state, battle_id, &session).await?;

    let battle = state.orchestrator.set_demo(battle_id, update.is_demo).await?;
    process_info!(ProcessId::current(), "🏷️ Battle {} demo flag set to {}", battle_id, update.is_demo);
    Ok(Json(JobRecord::from(&battle)))
}

/// DELETE /api/battles/:id
pub async fn delete_battle<S, F, J>(
    State(state): State<AppState<S, F, J>>,
    session: Session,
    Path(battle_id): Path<Uuid>,
) -> WebServerResult<Json<Value>>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    owned_battle(&state, battle_id, &session).await?;
    state.orchestrator.delete_job(battle_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Battle {battle_id} deleted"),
    })))
}
