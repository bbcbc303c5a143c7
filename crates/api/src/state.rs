use std::sync::Arc;

use scenecast_engine::service::JobService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The job lifecycle service (submit / poll / cancel / list / stats).
    pub service: Arc<JobService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
