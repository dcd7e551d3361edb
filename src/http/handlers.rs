use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::orchestrator::ExecuteRequest;

use super::auth::Principal;
use super::dto::{ExecuteRequestDto, JobAcceptedDto, JobStatusDto};
use super::error_codes::{ApiError, ErrorCode};
use super::AppState;

pub async fn execute_job(
    State(state): State<AppState>,
    principal: axum::Extension<Principal>,
    headers: HeaderMap,
    Json(payload): Json<ExecuteRequestDto>,
) -> Result<Response, ApiError> {
    if payload.task.trim().chars().count() < 3 {
        return Err(ApiError(ErrorCode::ApiError));
    }

    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let http_request_id = headers.get("X-Request-Id").and_then(|v| v.to_str().ok()).map(str::to_string);

    let accepted = state
        .orchestrator
        .create_and_enqueue(
            ExecuteRequest { task: payload.task, mode: Some(payload.mode), webhook_url: payload.webhook_url },
            &principal.user_id,
            http_request_id,
            idempotency_key,
        )
        .await?;

    let mut response = (
        StatusCode::ACCEPTED,
        Json(JobAcceptedDto { job_id: accepted.job_id, status: accepted.status, request_id: accepted.request_id }),
    )
        .into_response();

    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/agent/jobs/{}", accepted.job_id)) {
        response.headers_mut().insert(axum::http::header::LOCATION, location);
    }
    response.headers_mut().insert("Retry-After", HeaderValue::from_static("2"));

    Ok(response)
}

pub async fn get_job_status(
    State(state): State<AppState>,
    principal: axum::Extension<Principal>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusDto>, ApiError> {
    let job = state.orchestrator.get_status_owner_guard(job_id, &principal.user_id).await?;
    Ok(Json(job.into()))
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    state.jobs.get(Uuid::nil()).await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    state.queue.ping().await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok("ready")
}
