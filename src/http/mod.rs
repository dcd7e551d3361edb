//! Public HTTP surface: job submission and status polling.

pub mod auth;
pub mod dto;
pub mod error_codes;
mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::JwtConfig;
use crate::job::JobStore;
use crate::orchestrator::Orchestrator;
use crate::queue::QueueProducer;

use auth::JwtState;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub jobs: Arc<dyn JobStore>,
    pub queue: Arc<dyn QueueProducer>,
}

pub fn router(state: AppState, jwt_config: &JwtConfig, api_prefix: &str) -> Router {
    let jwt_state = Arc::new(JwtState::new(jwt_config));

    let authenticated = Router::new()
        .route("/agent/execute", post(handlers::execute_job))
        .route("/agent/jobs/{job_id}", get(handlers::get_job_status))
        .route_layer(axum::middleware::from_fn_with_state(jwt_state, auth::require_auth));

    Router::new()
        .nest(api_prefix, authenticated)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
