//! Where the polling client reads job snapshots from.
//!
//! The poller is generic over [`StatusSource`] so tests can script
//! sequences, and so a fallback read path (e.g. the origin API behind a
//! regional replica) can be configured alongside the primary.

use async_trait::async_trait;
use serde::Deserialize;

use scenecast_core::job::JobSnapshot;
use scenecast_core::types::JobId;

/// Error surfaced by a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source does not (or does not yet) know the job.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// Transport-level failure; the next tick may succeed.
    #[error("Status fetch failed: {0}")]
    Transport(String),
}

/// A read path for job snapshots.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: JobId) -> Result<JobSnapshot, SourceError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Reads snapshots from a scenecast API server's status endpoint.
pub struct HttpStatusSource {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl HttpStatusSource {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    /// `user_id` is forwarded as the authenticated caller identity.
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            user_id: user_id.into(),
        }
    }
}

/// The `{ "data": ... }` envelope every API response uses.
#[derive(Deserialize)]
struct Envelope {
    data: JobSnapshot,
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: JobId) -> Result<JobSnapshot, SourceError> {
        let url = format!("{}/api/v1/jobs/{job_id}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-user-id", &self.user_id)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(job_id));
        }
        if !response.status().is_success() {
            return Err(SourceError::Transport(format!(
                "Unexpected status {}",
                response.status()
            )));
        }

        response
            .json::<Envelope>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| SourceError::Transport(e.to_string()))
    }
}
