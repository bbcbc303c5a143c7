//! Handlers for resolved artifact endpoints.
//!
//! These are the stable, externally fetchable paths the result resolver
//! hands out. Each redirects to the storage backend; callers never see
//! the internal `artifact://` locators.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect};

use scenecast_core::error::CoreError;
use scenecast_core::job::JobStatus;
use scenecast_core::resolver;
use scenecast_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::identity::CallerIdentity;
use crate::state::AppState;

/// Look up the caller's job and return its raw result, or 409 while the
/// job has none.
async fn successful_result(
    state: &AppState,
    job_id: JobId,
    caller: &CallerIdentity,
) -> AppResult<scenecast_core::job::RawJobResult> {
    let record = state.service.get(job_id).await?;
    if record.submitted_by != caller.user_id {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }));
    }
    if record.status != JobStatus::Success {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is {} and has no downloadable result",
            record.status.as_str()
        ))));
    }
    record.result.ok_or_else(|| {
        AppError::InternalError(format!("Successful job {job_id} has no recorded result"))
    })
}

/// Redirect to the storage backend for the given internal locator.
fn storage_redirect(state: &AppState, locator: &str) -> AppResult<Redirect> {
    let path = resolver::parse_locator(locator)?;
    let base = state.config.storage_base_url.trim_end_matches('/');
    Ok(Redirect::temporary(&format!("{base}/{path}")))
}

/// GET /api/v1/jobs/{id}/download
///
/// The finished video for a successful job.
pub async fn download(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let result = successful_result(&state, job_id, &caller).await?;
    storage_redirect(&state, &result.video_locator)
}

/// GET /api/v1/jobs/{id}/preview
///
/// The preview artifact, when the pipeline produced one.
pub async fn preview(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let result = successful_result(&state, job_id, &caller).await?;
    let locator = result.preview_locator.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Preview",
        id: job_id,
    }))?;
    storage_redirect(&state, &locator)
}
