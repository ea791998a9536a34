//! Main webserver implementation
//!
//! Wraps the battle orchestrator in an axum router. The router is generic over
//! the injected services so tests can serve it over the in-memory store and
//! scripted providers, and the binary over SQLite and the real providers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use shared::{process_info, ProcessId};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use orchestrator::{BackendFactory, BattleOrchestrator, DispatchHandle, Judge, JobStore};

use crate::error::{WebServerError, WebServerResult};
use crate::state::AppState;
use crate::web::handlers::{api, backends};

/// Main webserver struct with dependency injection
pub struct WebServer<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    state: AppState<S, F, J>,
}

impl<S, F, J> WebServer<S, F, J>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    pub fn new(orchestrator: Arc<BattleOrchestrator<S, F, J>>, dispatch: DispatchHandle) -> Self {
        Self {
            state: AppState::new(orchestrator, dispatch),
        }
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            // Backend registry
            .route(
                "/api/backends",
                post(backends::create_backend::<S, F, J>).get(backends::list_backends::<S, F, J>),
            )
            .route("/api/backends/:id", delete(backends::delete_backend::<S, F, J>))
            // Battles
            .route(
                "/api/battles",
                post(api::create_battle::<S, F, J>).get(api::list_battles::<S, F, J>),
            )
            .route(
                "/api/battles/:id",
                get(api::get_battle::<S, F, J>)
                    .patch(api::update_battle::<S, F, J>)
                    .delete(api::delete_battle::<S, F, J>),
            )
            .route("/api/battles/:id/queries", get(api::get_battle_queries::<S, F, J>))
            .route("/api/battles/:id/retry", post(api::retry_battle::<S, F, J>))
            // Health check
            .route("/health", get(health_check::<S, F, J>))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive())
                    .into_inner(),
            )
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish
    pub async fn run<Sig>(&self, bind_address: SocketAddr, shutdown: Sig) -> WebServerResult<()>
    where
        Sig: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .map_err(|e| WebServerError::ServerStartup(format!("Failed to bind to {bind_address}: {e}")))?;

        process_info!(ProcessId::current(), "🌐 HTTP API listening on http://{}", bind_address);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    /// Get server state for external access
    pub fn state(&self) -> &AppState<S, F, J> {
        &self.state
    }
}

/// Health check endpoint
async fn health_check<S, F, J>(State(state): State<AppState<S, F, J>>) -> Json<Value>
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "uptime": state.uptime_seconds(),
    }))
}
