//! Lease reaper.
//!
//! Lease expiry is the sole timeout mechanism for stalled workers: a job
//! orphaned by a crash becomes re-deliverable once its lease expires.
//! The reaper runs as a single long-lived task, resetting orphaned jobs
//! to `pending` and putting them back on the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::models::QueueEntry;
use crate::queue::JobQueue;
use crate::store::{JobMutation, JobStore};

/// Default interval between expiry sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5);

pub struct LeaseReaper {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    interval: Duration,
}

impl LeaseReaper {
    pub fn new(store: Arc<JobStore>, queue: Arc<JobQueue>, interval: Duration) -> Self {
        Self {
            store,
            queue,
            interval,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Lease reaper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Lease reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One sweep: re-deliver every job whose lease has expired.
    pub async fn sweep(&self) {
        let expired = self.queue.reap_expired(chrono::Utc::now()).await;

        for lease in expired {
            match self
                .store
                .apply(
                    lease.job_id,
                    JobMutation::Redeliver {
                        worker_id: lease.worker_id,
                    },
                )
                .await
            {
                Ok(record) => {
                    tracing::warn!(
                        job_id = %lease.job_id,
                        worker_id = lease.worker_id,
                        "Lease expired; job re-queued",
                    );
                    self.queue
                        .enqueue(QueueEntry {
                            job_id: lease.job_id,
                            priority: record.priority,
                            enqueued_at: chrono::Utc::now(),
                        })
                        .await;
                }
                Err(e) => {
                    // The job finished (or was cancelled) in the window
                    // between expiry and the sweep.
                    tracing::debug!(
                        job_id = %lease.job_id,
                        worker_id = lease.worker_id,
                        error = %e,
                        "Expired lease not re-delivered",
                    );
                }
            }
        }
    }
}
