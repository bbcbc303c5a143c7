use std::time::Duration;

use scenecast_core::retry::RetryPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Number of concurrent generation workers (default: `4`).
    pub worker_count: u32,
    /// Lease duration granted to a worker per checkpoint (default: `30`).
    pub lease_ttl_secs: u64,
    /// Interval between lease-expiry sweeps (default: `5`).
    pub reap_interval_secs: u64,
    /// Maximum automatic retries for transient pipeline failures
    /// (default: `3`).
    pub max_retries: u32,
    /// Base URL of the artifact storage backend that download redirects
    /// point at (default: `http://localhost:9000/artifacts`).
    pub storage_base_url: String,
    /// Base URL of the render service that executes pipeline stages
    /// (default: `http://localhost:8188`).
    pub render_service_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                            |
    /// |-------------------------|------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                          |
    /// | `PORT`                  | `3000`                             |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`            |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                               |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                               |
    /// | `WORKER_COUNT`          | `4`                                |
    /// | `LEASE_TTL_SECS`        | `30`                               |
    /// | `REAP_INTERVAL_SECS`    | `5`                                |
    /// | `MAX_RETRIES`           | `3`                                |
    /// | `STORAGE_BASE_URL`      | `http://localhost:9000/artifacts`  |
    /// | `RENDER_SERVICE_URL`    | `http://localhost:8188`            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs = env_u64("SHUTDOWN_TIMEOUT_SECS", 30);
        let worker_count = env_u64("WORKER_COUNT", 4) as u32;
        let lease_ttl_secs = env_u64("LEASE_TTL_SECS", 30);
        let reap_interval_secs = env_u64("REAP_INTERVAL_SECS", 5);
        let max_retries = env_u64("MAX_RETRIES", 3) as u32;

        let storage_base_url = std::env::var("STORAGE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000/artifacts".into());
        let render_service_url =
            std::env::var("RENDER_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8188".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            worker_count,
            lease_ttl_secs,
            reap_interval_secs,
            max_retries,
            storage_base_url,
            render_service_url,
        }
    }

    /// Lease duration as a [`Duration`].
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Reap interval as a [`Duration`].
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// The retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
}
