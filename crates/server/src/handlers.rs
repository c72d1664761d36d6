//! REST handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use krait_core::{Credential, HostObservation, Job, JobId, OutputLine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub job_type: String,
    pub target: String,
}

pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state
        .orchestrator
        .submit(&request.job_type, &request.target)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.store.list(query.limit).await?;
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.store.get(JobId(id)).await?))
}

pub async fn job_output(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OutputLine>>, ApiError> {
    Ok(Json(state.store.outputs(JobId(id)).await?))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.cancel(JobId(id)).await?;
    Ok(Json(json!({ "cancelling": id })))
}

/// Secrets never serialize; this lists identities only.
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<Credential>> {
    Json(state.sessions.list().await)
}

pub async fn inventory(State(state): State<AppState>) -> Json<Vec<HostObservation>> {
    Json(state.inventory.snapshot())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoExploitState {
    pub enabled: bool,
}

pub async fn auto_exploit(State(state): State<AppState>) -> Json<AutoExploitState> {
    Json(AutoExploitState {
        enabled: state.orchestrator.auto_exploit(),
    })
}

pub async fn set_auto_exploit(
    State(state): State<AppState>,
    Json(request): Json<AutoExploitState>,
) -> Json<AutoExploitState> {
    state.orchestrator.set_auto_exploit(request.enabled);
    Json(AutoExploitState {
        enabled: state.orchestrator.auto_exploit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use axum::body::Body;
    use axum::http::{header, Request};
    use krait_adapters::{InMemoryBus, InMemorySessionStore, SqliteJobStore};
    use krait_engine::{HostInventory, Orchestrator, ParserRegistry, ProcessRunner};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let bus = Arc::new(InMemoryBus::default());
        let store: Arc<dyn krait_ports::JobStore> = Arc::new(
            SqliteJobStore::connect_in_memory(bus.clone()).await.unwrap(),
        );
        let sessions = Arc::new(InMemorySessionStore::new());
        let inventory = Arc::new(HostInventory::new());
        let (runner, _done_rx) = ProcessRunner::new(store.clone(), 1);
        let orchestrator = Orchestrator::new(
            store.clone(),
            runner,
            sessions.clone(),
            bus.clone(),
            inventory.clone(),
            ParserRegistry::with_defaults(),
            false,
        );
        AppState {
            orchestrator,
            store,
            sessions,
            inventory,
            events: bus,
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_bad_request() {
        let app = router(test_state().await);
        let request = Request::post("/api/jobs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"job_type": "frobnicate", "target": "10.0.0.1"}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("frobnicate"));
    }

    #[tokio::test]
    async fn test_exploit_submit_without_credential_is_bad_request() {
        let app = router(test_state().await);
        let request = Request::post("/api/jobs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"job_type": "psexec", "target": "10.0.0.1"}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/api/jobs/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auto_exploit_toggle() {
        let app = router(test_state().await);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/auto_exploit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["enabled"], false);

        let request = Request::post("/api/auto_exploit")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"enabled": true}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await["enabled"], true);
    }

    #[tokio::test]
    async fn test_empty_sessions_and_inventory() {
        let app = router(test_state().await);

        let response = app
            .clone()
            .oneshot(Request::get("/api/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!([]));

        let response = app
            .oneshot(Request::get("/api/inventory").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!([]));
    }
}
