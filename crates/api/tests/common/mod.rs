use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use scenecast_api::config::ServerConfig;
use scenecast_api::routes;
use scenecast_api::state::AppState;
use scenecast_engine::queue::JobQueue;
use scenecast_engine::service::JobService;
use scenecast_engine::store::JobStore;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        worker_count: 0,
        lease_ttl_secs: 30,
        reap_interval_secs: 5,
        max_retries: 3,
        storage_base_url: "http://storage.local/artifacts".to_string(),
        render_service_url: "http://localhost:8188".to_string(),
    }
}

/// A fully assembled app plus direct handles on the engine, so tests
/// can script worker-side writes without running real workers.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<JobStore>,
    pub service: Arc<JobService>,
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration
/// tests exercise the same middleware stack (CORS, request ID, timeout,
/// tracing, panic recovery) that production uses. No workers are
/// spawned: tests drive the store directly where execution matters.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(JobStore::new());
    let queue = Arc::new(JobQueue::new(config.lease_ttl()));
    let service = Arc::new(JobService::new(Arc::clone(&store), Arc::clone(&queue)));

    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        app,
        store,
        service,
    }
}

/// Issue a GET as the given user.
pub async fn get(app: &Router, path: &str, user: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method(Method::GET).uri(path);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Issue a POST with a JSON body as the given user.
pub async fn post_json(
    app: &Router,
    path: &str,
    user: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    app.clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
