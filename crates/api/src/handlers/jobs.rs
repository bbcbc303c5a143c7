//! Handlers for the `/jobs` resource.
//!
//! All endpoints require a caller identity via [`CallerIdentity`].
//! Submission returns immediately; execution is observed by polling.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use scenecast_core::error::CoreError;
use scenecast_core::types::JobId;
use scenecast_engine::models::{JobListQuery, JobRecord, SubmitJob};

use crate::error::{AppError, AppResult};
use crate::identity::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID and verify the caller owns it.
///
/// Returns `NotFound` for jobs owned by other users rather than
/// `Forbidden`, so callers cannot probe for foreign job ids.
async fn find_and_authorize(
    state: &AppState,
    job_id: JobId,
    caller: &CallerIdentity,
) -> AppResult<JobRecord> {
    let record = state.service.get(job_id).await?;
    if record.submitted_by != caller.user_id {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }));
    }
    Ok(record)
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Submit a new generation job. Returns 201 with the initial snapshot;
/// the job starts in `pending` and is picked up by the worker pool.
pub async fn submit_job(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.service.submit(&caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: snapshot })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List the caller's jobs, newest first. Supports `page` and `limit`
/// query parameters.
pub async fn list_jobs(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = state.service.list(&caller.user_id, &params).await;
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/stats
///
/// Job counts by status, across all users.
pub async fn job_stats(
    _caller: CallerIdentity,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = state.service.stats().await;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Full record of one of the caller's jobs.
pub async fn get_job(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = find_and_authorize(&state, job_id, &caller).await?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/jobs/{id}/status
///
/// Polling snapshot: status, progress, message, result/error.
pub async fn get_job_status(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let record = find_and_authorize(&state, job_id, &caller).await?;
    Ok(Json(DataResponse {
        data: record.snapshot(),
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cancellation of a pending or running job. Returns 409 if the
/// job is already in a terminal state. Acceptance means the request was
/// recorded; a running job reaches `cancelled` at the worker's next
/// checkpoint.
pub async fn cancel_job(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    find_and_authorize(&state, job_id, &caller).await?;
    state.service.cancel(job_id).await?;

    tracing::info!(%job_id, user_id = %caller.user_id, "Job cancellation accepted");

    Ok(Json(DataResponse {
        data: serde_json::json!({ "accepted": true }),
    }))
}
