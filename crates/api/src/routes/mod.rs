pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                   submit (POST), list (GET)
/// /jobs/stats             counts by status
/// /jobs/{id}              full record
/// /jobs/{id}/status       polling snapshot
/// /jobs/{id}/cancel       request cancellation (POST)
/// /jobs/{id}/download     redirect to the finished video
/// /jobs/{id}/preview      redirect to the preview artifact
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
