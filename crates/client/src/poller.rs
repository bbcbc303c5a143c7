//! The polling loop.
//!
//! One cooperative loop per job: fetch a snapshot, deliver it, wait out
//! the interval, repeat. The loop stops scheduling fetches the moment a
//! terminal status is observed, delivering the matching terminal
//! callback exactly once. Abandonment cancels the token; an in-flight
//! response that loses the race is discarded without touching the
//! observer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use scenecast_core::job::{JobSnapshot, JobStatus};
use scenecast_core::resolver::{self, ResolvedResult};
use scenecast_core::types::JobId;

use crate::source::{SourceError, StatusSource};

/// Default interval between snapshot fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Consecutive transport failures tolerated before the poller gives up.
const MAX_CONSECUTIVE_FETCH_FAILURES: u32 = 5;

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Why polling stopped without a terminal snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// No configured source knows the job.
    #[error("Job {0} not found on any status source")]
    NotFound(JobId),

    /// Too many consecutive transport failures.
    #[error("Polling gave up: {0}")]
    Transport(String),
}

/// Caller-side hooks. Every method has an empty default so observers
/// implement only what they need.
///
/// For one poll, exactly one of `on_complete`, `on_terminal`, or
/// `on_error` is invoked, exactly once, as the last delivery.
pub trait JobObserver: Send + Sync {
    /// Every fetched snapshot, including the terminal one.
    fn on_update(&self, _snapshot: &JobSnapshot) {}

    /// The job succeeded; `result` is the resolved, externally
    /// fetchable form.
    fn on_complete(&self, _snapshot: &JobSnapshot, _result: ResolvedResult) {}

    /// The job reached `failure` or `cancelled`.
    fn on_terminal(&self, _snapshot: &JobSnapshot) {}

    /// Polling stopped without a terminal snapshot.
    fn on_error(&self, _error: &PollError) {}
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Configuration for one polling loop.
pub struct JobPoller {
    primary: Arc<dyn StatusSource>,
    fallback: Option<Arc<dyn StatusSource>>,
    interval: Duration,
}

impl JobPoller {
    pub fn new(primary: Arc<dyn StatusSource>) -> Self {
        Self {
            primary,
            fallback: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Alternate read path consulted when the primary does not know the
    /// job (e.g. a narrow propagation race behind a replica).
    pub fn with_fallback(mut self, fallback: Arc<dyn StatusSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling `job_id`. The returned handle abandons the loop.
    pub fn spawn(self, job_id: JobId, observer: Arc<dyn JobObserver>) -> PollerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(self, job_id, observer, cancel.clone()));
        PollerHandle { cancel, task }
    }
}

/// Handle over a running polling loop.
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop scheduling fetches. Any in-flight response is discarded and
    /// no further observer callbacks fire.
    pub fn abandon(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

async fn poll_loop(
    poller: JobPoller,
    job_id: JobId,
    observer: Arc<dyn JobObserver>,
    cancel: CancellationToken,
) {
    let mut consecutive_failures = 0u32;

    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = fetch_with_fallback(&poller, job_id) => fetched,
        };
        // Abandoned while the response was in flight: discard it.
        if cancel.is_cancelled() {
            return;
        }

        match fetched {
            Ok(snapshot) => {
                consecutive_failures = 0;
                observer.on_update(&snapshot);

                match snapshot.status {
                    JobStatus::Success => {
                        match &snapshot.result {
                            Some(raw) => {
                                observer.on_complete(&snapshot, resolver::resolve(job_id, raw));
                            }
                            None => {
                                // Violates the result-iff-success invariant.
                                observer.on_error(&PollError::Transport(
                                    "Success snapshot carried no result".to_string(),
                                ));
                            }
                        }
                        return;
                    }
                    JobStatus::Failure | JobStatus::Cancelled => {
                        observer.on_terminal(&snapshot);
                        return;
                    }
                    JobStatus::Pending | JobStatus::Processing => {}
                }
            }
            Err(PollError::NotFound(id)) => {
                observer.on_error(&PollError::NotFound(id));
                return;
            }
            Err(PollError::Transport(message)) => {
                consecutive_failures += 1;
                tracing::warn!(
                    %job_id,
                    consecutive_failures,
                    error = %message,
                    "Status fetch failed",
                );
                if consecutive_failures >= MAX_CONSECUTIVE_FETCH_FAILURES {
                    observer.on_error(&PollError::Transport(message));
                    return;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(poller.interval) => {}
        }
    }
}

/// Fetch from the primary, falling back to the alternate read path when
/// the primary does not know the job.
async fn fetch_with_fallback(poller: &JobPoller, job_id: JobId) -> Result<JobSnapshot, PollError> {
    match poller.primary.fetch(job_id).await {
        Ok(snapshot) => Ok(snapshot),
        Err(SourceError::Transport(message)) => Err(PollError::Transport(message)),
        Err(SourceError::NotFound(_)) => {
            let Some(fallback) = &poller.fallback else {
                return Err(PollError::NotFound(job_id));
            };
            tracing::debug!(%job_id, "Primary source does not know the job; trying fallback");
            match fallback.fetch(job_id).await {
                Ok(snapshot) => Ok(snapshot),
                Err(SourceError::NotFound(id)) => Err(PollError::NotFound(id)),
                Err(SourceError::Transport(message)) => Err(PollError::Transport(message)),
            }
        }
    }
}
