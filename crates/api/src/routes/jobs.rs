//! Route definitions for the jobs resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{downloads, jobs};
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST /                  -> submit_job
/// GET  /                  -> list_jobs
/// GET  /stats             -> job_stats
/// GET  /{id}              -> get_job
/// GET  /{id}/status       -> get_job_status
/// POST /{id}/cancel       -> cancel_job
/// GET  /{id}/download     -> download
/// GET  /{id}/preview      -> preview
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/stats", get(jobs::job_stats))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/status", get(jobs::get_job_status))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/download", get(downloads::download))
        .route("/{id}/preview", get(downloads::preview))
}
