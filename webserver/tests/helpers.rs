//! Test helper utilities for webserver route tests
//!
//! Builds the real router over the in-memory store, a provider registry with
//! scripted backends, and a judge with fixed scores. Requests go through
//! `tower::ServiceExt::oneshot`, so no socket is opened.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use shared::{BackendRecord, SearchHit, SearchResponse};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use orchestrator::services::{BackendRegistry, MemoryJobStore};
use orchestrator::{
    BackendFactory, BattleOrchestrator, Evaluation, JobQueue, JobReceiver, JobStore, Judge, OrchestratorResult,
    SearchBackend, SideVerdict, Worker,
};
use webserver::{WebServer, SESSION_HEADER};

use crate::fixtures::{CREDENTIALS, PROVIDER_A, PROVIDER_B, SCORE_A, SCORE_B};

/// Backend returning a single hit named after the provider and query
pub struct ScriptedBackend {
    name: &'static str,
}

#[async_trait::async_trait]
impl SearchBackend for ScriptedBackend {
    fn provider(&self) -> &str {
        self.name
    }

    async fn search(&self, query: &str) -> OrchestratorResult<SearchResponse> {
        Ok(SearchResponse::new(vec![SearchHit::new(
            format!("{}-{query}", self.name),
            query,
            format!("{} result", self.name),
        )]))
    }
}

/// Judge giving every query the same pair of scores
pub struct FixedJudge;

#[async_trait::async_trait]
impl Judge for FixedJudge {
    async fn evaluate(&self, query: &str, _hits_a: &[SearchHit], _hits_b: &[SearchHit]) -> OrchestratorResult<Evaluation> {
        Ok(Evaluation {
            side_a: SideVerdict::new(SCORE_A, format!("a on {query}")),
            side_b: SideVerdict::new(SCORE_B, format!("b on {query}")),
            usage: Default::default(),
            duration_ms: 1,
        })
    }
}

pub fn scripted_registry() -> BackendRegistry {
    BackendRegistry::new()
        .register(PROVIDER_A, |_, _| {
            Ok(Arc::new(ScriptedBackend { name: PROVIDER_A }) as Arc<dyn SearchBackend>)
        })
        .register(PROVIDER_B, |_, _| {
            Ok(Arc::new(ScriptedBackend { name: PROVIDER_B }) as Arc<dyn SearchBackend>)
        })
}

/// A router with its orchestrator and two seeded backend records
pub struct TestApp {
    pub router: Router,
    pub backend1: Uuid,
    pub backend2: Uuid,
    worker_shutdown: Option<mpsc::Sender<()>>,
    /// Held open when no worker runs so dispatches still succeed
    _idle_receiver: Option<JobReceiver>,
}

impl TestApp {
    /// Battles stay pending; nothing consumes the queue
    pub async fn idle() -> Self {
        Self::build(false).await
    }

    /// A background worker processes dispatched battles
    pub async fn with_worker() -> Self {
        Self::build(true).await
    }

    async fn build(run_worker: bool) -> Self {
        let store = MemoryJobStore::new();
        let record_a = BackendRecord::new("Backend A", PROVIDER_A, Some(CREDENTIALS.to_string()));
        let record_b = BackendRecord::new("Backend B", PROVIDER_B, Some(CREDENTIALS.to_string()));
        store.insert_backend(record_a.clone()).await.unwrap();
        store.insert_backend(record_b.clone()).await.unwrap();

        let orchestrator = Arc::new(BattleOrchestrator::new(store, scripted_registry(), FixedJudge));
        let (dispatch, receiver) = JobQueue::bounded(16);

        let (worker_shutdown, idle_receiver) = if run_worker {
            let worker = Worker::new(Arc::clone(&orchestrator), receiver, 2);
            let shutdown = worker.get_shutdown_sender();
            tokio::spawn(worker.run());
            (Some(shutdown), None)
        } else {
            (None, Some(receiver))
        };

        Self {
            router: WebServer::new(orchestrator, dispatch).build_router(),
            backend1: record_a.id,
            backend2: record_b.id,
            worker_shutdown,
            _idle_receiver: idle_receiver,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, session: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, session, body).await
    }

    /// Create a battle for the seeded backends and return its id
    pub async fn create_battle(&self, session: Option<&str>) -> Uuid {
        let body = crate::fixtures::battle_request(self.backend1, self.backend2);
        let (status, record) = self.send(Method::POST, "/api/battles", session, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body {record}");
        serde_json::from_value(record["id"].clone()).unwrap()
    }

    /// Poll GET /api/battles/:id until the status matches
    pub async fn wait_for_status(&self, battle_id: Uuid, session: Option<&str>, status: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let (code, record) = self
                .send(Method::GET, &format!("/api/battles/{battle_id}"), session, None)
                .await;
            assert_eq!(code, StatusCode::OK);
            if record["status"] == status {
                return record;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "battle {battle_id} stuck in {} waiting for {status}",
                record["status"]
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(&self) {
        if let Some(shutdown) = &self.worker_shutdown {
            let _ = shutdown.send(()).await;
        }
    }
}

/// Send one request through the router and decode the JSON body
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// Router over arbitrary services, with the queue kept open by the caller
pub fn router_for<S, F, J>(orchestrator: BattleOrchestrator<S, F, J>) -> (Router, JobReceiver)
where
    S: JobStore + 'static,
    F: BackendFactory + 'static,
    J: Judge + 'static,
{
    let (dispatch, receiver) = JobQueue::bounded(4);
    (WebServer::new(Arc::new(orchestrator), dispatch).build_router(), receiver)
}
