use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{AuthQuery, HealthResponse},
    state::AppState,
    utils,
};
use crate::ledger::JobView;
use crate::tracker::JobRequest;

/// Reject requests whose `?token=` does not match `server.token`
pub async fn require_token(
    State(state): State<AppState>,
    Query(auth): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    utils::check_token(&auth.token, &state.config.server.token).inspect_err(|_| {
        tracing::warn!(path = %request.uri().path(), "Rejected request with bad token");
    })?;
    Ok(next.run(request).await)
}

/// Job submission endpoint (POST /download)
///
/// ## Flow:
/// 1. Require `Content-Type: application/json`
/// 2. Read the body (already decompressed by middleware), stopping at the size limit
/// 3. Parse a [`JobRequest`] and hand it to the tracker
/// 4. Return 201 Created with the job in `Created` state
///
/// The job runs in the background; clients poll `/tasks/{id}` or `/history`.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    utils::parse_content_type(content_type)?;

    let max_size = state.config.server.api.max_payload_bytes.as_usize();
    let body_bytes = read_body(body, max_size).await?;

    let request: JobRequest = serde_json::from_slice(&body_bytes)?;
    let view = state.tracker.create_job(request)?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Collect the body, giving up as soon as it grows past `max_size`
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Bytes, ApiError> {
    let collected = Limited::new(body, max_size).collect().await.map_err(|err| {
        if err.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(max_size)
        } else {
            ApiError::InvalidPayload(err.to_string())
        }
    })?;

    Ok(collected.to_bytes())
}

/// Jobs still being processed, in arrival order (GET /tasks)
pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<JobView>> {
    Json(state.tracker.list_active_jobs())
}

/// One job, running or finished (GET /tasks/{id})
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::InvalidPayload(format!("invalid job id: {id}")))?;

    state
        .tracker
        .find_job(job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))
}

/// Most recently finished jobs, oldest first (GET /history)
pub async fn list_history(State(state): State<AppState>) -> Json<Vec<JobView>> {
    Json(state.tracker.list_history())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_jobs: state.tracker.list_active_jobs().len(),
        outstanding_jobs: state.tracker.outstanding(),
        jobs: state.tracker.metrics(),
    })
}
