//! Integration tests for the `/api/v1/jobs` surface.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, TestApp};

use scenecast_core::job::RawJobResult;
use scenecast_core::types::JobId;
use scenecast_engine::store::JobMutation;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn submit_body() -> serde_json::Value {
    serde_json::json!({
        "job_type": "video_render",
        "parameters": { "script_id": 7, "template": "daily-recap" },
        "priority": 5,
    })
}

/// Submit a job over HTTP and return its id.
async fn submit_job(test_app: &TestApp, user: &str) -> JobId {
    let response = post_json(&test_app.app, "/api/v1/jobs", Some(user), submit_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["job_id"]
        .as_str()
        .expect("job_id present")
        .parse()
        .expect("job_id is a uuid")
}

/// Script the worker-side writes that take a job to `success`.
async fn drive_to_success(test_app: &TestApp, job_id: JobId, preview: bool) {
    test_app
        .store
        .apply(job_id, JobMutation::MarkProcessing { worker_id: 0 })
        .await
        .unwrap();
    test_app
        .store
        .apply(
            job_id,
            JobMutation::Complete {
                worker_id: 0,
                result: RawJobResult {
                    video_locator: format!("artifact://renders/{job_id}/final.mp4"),
                    preview_locator: preview
                        .then(|| format!("artifact://renders/{job_id}/preview.webm")),
                    duration_secs: 30.0,
                    size_bytes: 1_048_576,
                    width: 1920,
                    height: 1080,
                },
            },
        )
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_created_pending_snapshot() {
    let test_app = common::build_test_app();
    let response = post_json(&test_app.app, "/api/v1/jobs", Some("user-1"), submit_body()).await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["progress"], 0.0);
    assert_eq!(json["data"]["retry_count"], 0);
    assert!(json["data"]["job_id"].is_string());
    assert!(json["data"].get("result").is_none());
    assert!(json["data"].get("error").is_none());
}

#[tokio::test]
async fn submit_without_identity_is_unauthorized() {
    let test_app = common::build_test_app();
    let response = post_json(&test_app.app, "/api/v1/jobs", None, submit_body()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn submit_with_empty_job_type_is_rejected() {
    let test_app = common::build_test_app();
    let response = post_json(
        &test_app.app,
        "/api/v1/jobs",
        Some("user-1"),
        serde_json::json!({ "job_type": "", "parameters": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn submit_with_array_parameters_is_rejected() {
    let test_app = common::build_test_app();
    let response = post_json(
        &test_app.app,
        "/api/v1/jobs",
        Some("user-1"),
        serde_json::json!({ "job_type": "video_render", "parameters": [1, 2] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Status polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_roundtrip_for_pending_job() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/status"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["job_id"], job_id.to_string());
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["progress"], 0.0);
}

#[tokio::test]
async fn consecutive_status_reads_are_identical() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    let path = format!("/api/v1/jobs/{job_id}/status");

    let first = body_json(get(&test_app.app, &path, Some("user-1")).await).await;
    let second = body_json(get(&test_app.app, &path, Some("user-1")).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn unknown_job_status_is_not_found() {
    let test_app = common::build_test_app();
    let job_id = uuid::Uuid::now_v7();

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/status"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn foreign_jobs_are_invisible() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}"),
        Some("user-2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn success_snapshot_carries_result() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, job_id, true).await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/status"),
        Some("user-1"),
    )
    .await;
    let json = body_json(response).await;

    assert_eq!(json["data"]["status"], "success");
    assert_eq!(json["data"]["progress"], 1.0);
    assert!(json["data"]["result"]["video_locator"].is_string());
    assert!(json["data"].get("error").is_none());
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_pending_job_is_accepted() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;

    let response = post_json(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/cancel"),
        Some("user-1"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["accepted"], true);

    let record = test_app.service.get(job_id).await.unwrap();
    assert!(record.cancel_requested);
}

#[tokio::test]
async fn cancel_terminal_job_is_a_conflict() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, job_id, false).await;

    let response = post_json(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/cancel"),
        Some("user-1"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let test_app = common::build_test_app();
    let job_id = uuid::Uuid::now_v7();

    let response = post_json(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/cancel"),
        Some("user-1"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// List and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_scopes_and_pages() {
    let test_app = common::build_test_app();
    submit_job(&test_app, "user-1").await;
    submit_job(&test_app, "user-1").await;
    submit_job(&test_app, "user-2").await;

    let json = body_json(
        get(&test_app.app, "/api/v1/jobs?limit=1&page=1", Some("user-1")).await,
    )
    .await;
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stats_count_by_status() {
    let test_app = common::build_test_app();
    submit_job(&test_app, "user-1").await;
    let done = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, done, false).await;

    let json = body_json(get(&test_app.app, "/api/v1/jobs/stats", Some("user-1")).await).await;
    assert_eq!(json["data"]["pending"], 1);
    assert_eq!(json["data"]["success"], 1);
    assert_eq!(json["data"]["processing"], 0);
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_redirects_to_storage_backend() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, job_id, true).await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/download"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()["location"].to_str().unwrap();
    assert_eq!(
        location,
        format!("http://storage.local/artifacts/renders/{job_id}/final.mp4")
    );
}

#[tokio::test]
async fn preview_redirects_when_present() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, job_id, true).await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/preview"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn preview_missing_is_not_found() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;
    drive_to_success(&test_app, job_id, false).await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/preview"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_before_completion_is_a_conflict() {
    let test_app = common::build_test_app();
    let job_id = submit_job(&test_app, "user-1").await;

    let response = get(
        &test_app.app,
        &format!("/api/v1/jobs/{job_id}/download"),
        Some("user-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
