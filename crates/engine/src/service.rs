//! Submission and cancellation service.
//!
//! The synchronous half of the job lifecycle: everything here returns
//! immediately. Execution happens out-of-band in the worker pool, and
//! worker-time errors are only ever observable through a job's
//! status/error fields.

use std::sync::Arc;

use validator::Validate;

use scenecast_core::error::CoreError;
use scenecast_core::job::JobSnapshot;
use scenecast_core::types::JobId;

use crate::models::{JobListPage, JobListQuery, JobRecord, JobStats, QueueEntry, SubmitJob};
use crate::queue::JobQueue;
use crate::store::{JobMutation, JobStore};

/// Front door for callers: submit, poll, cancel, list, stats.
pub struct JobService {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
}

impl JobService {
    pub fn new(store: Arc<JobStore>, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Accept a submission: validate, create the pending record, enqueue
    /// exactly one entry, and return the initial snapshot without waiting
    /// for execution.
    ///
    /// Validation failures create no state.
    pub async fn submit(&self, user_id: &str, input: SubmitJob) -> Result<JobSnapshot, CoreError> {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        if !input.parameters.is_object() {
            return Err(CoreError::Validation(
                "parameters must be a JSON object".to_string(),
            ));
        }

        let record = JobRecord::new(user_id, &input);
        let snapshot = record.snapshot();
        let entry = QueueEntry {
            job_id: record.id,
            priority: record.priority,
            enqueued_at: record.created_at,
        };

        self.store.create(record).await?;
        self.queue.enqueue(entry).await;

        tracing::info!(
            job_id = %snapshot.job_id,
            user_id,
            "Job submitted",
        );
        Ok(snapshot)
    }

    /// Current snapshot of a job.
    pub async fn get_status(&self, id: JobId) -> Result<JobSnapshot, CoreError> {
        self.store
            .get(id)
            .await
            .map(|record| record.snapshot())
            .ok_or(CoreError::NotFound { entity: "Job", id })
    }

    /// Full record of a job (includes payload and assignment fields).
    pub async fn get(&self, id: JobId) -> Result<JobRecord, CoreError> {
        self.store
            .get(id)
            .await
            .ok_or(CoreError::NotFound { entity: "Job", id })
    }

    /// Request cancellation of a pending or processing job.
    ///
    /// Acknowledgement means the request was accepted, not that the job
    /// is already `cancelled`: a processing job reaches `cancelled` at the
    /// worker's next checkpoint, and a pipeline that finishes just before
    /// observing the flag may still legitimately complete.
    pub async fn cancel(&self, id: JobId) -> Result<JobSnapshot, CoreError> {
        let record = self.store.apply(id, JobMutation::RequestCancel).await?;
        tracing::info!(job_id = %id, "Job cancellation requested");
        Ok(record.snapshot())
    }

    /// One page of the caller's jobs, newest first.
    pub async fn list(&self, user_id: &str, query: &JobListQuery) -> JobListPage {
        self.store.list(user_id, query).await
    }

    /// Job counts by status.
    pub async fn stats(&self) -> JobStats {
        self.store.stats().await
    }

    /// Entries currently awaiting a worker.
    pub async fn queue_depth(&self) -> usize {
        self.queue.depth().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
