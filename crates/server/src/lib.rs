//! HTTP command interface
//!
//! Thin axum layer over the orchestrator: job CRUD, credential and
//! inventory listings, the auto-exploit switch, and a websocket feed of
//! job events.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use krait_engine::{HostInventory, Orchestrator};
use krait_ports::{EventSubscriber, JobStore, SessionStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod ws;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn JobStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub inventory: Arc<HostInventory>,
    pub events: Arc<dyn EventSubscriber>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/jobs", get(handlers::list_jobs).post(handlers::submit_job))
        .route("/api/jobs/{id}", get(handlers::get_job))
        .route("/api/jobs/{id}/output", get(handlers::job_output))
        .route("/api/jobs/{id}/cancel", post(handlers::cancel_job))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/inventory", get(handlers::inventory))
        .route(
            "/api/auto_exploit",
            get(handlers::auto_exploit).post(handlers::set_auto_exploit),
        )
        .route("/api/events", get(ws::events))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
