//! The authoritative job record store.
//!
//! A concurrent keyed store with compare-and-swap-style updates: every
//! write goes through [`JobStore::apply`] with an explicit [`JobMutation`],
//! and each mutation validates the state-machine edge, the lease holder's
//! identity, and progress monotonicity before touching the record. Readers
//! always receive a cloned snapshot, never a partially written record.
//!
//! `RequestCancel` is the one mutation permitted to race with execution
//! writes; workers observe the flag at stage checkpoints.

use std::collections::HashMap;

use tokio::sync::RwLock;

use scenecast_core::error::CoreError;
use scenecast_core::job::{JobFailure, JobStatus, RawJobResult};
use scenecast_core::types::JobId;

use crate::models::{
    JobListPage, JobListQuery, JobRecord, JobStats, WorkerId, DEFAULT_LIMIT, MAX_LIMIT,
};

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Validated write operations against a single job record.
#[derive(Debug)]
pub enum JobMutation {
    /// `pending -> processing` by the worker that just acquired the lease.
    MarkProcessing { worker_id: WorkerId },

    /// Checkpoint write by the lease holder. Progress must not decrease.
    Progress {
        worker_id: WorkerId,
        progress: f64,
        message: Option<String>,
    },

    /// `processing -> success` with the result payload.
    Complete {
        worker_id: WorkerId,
        result: RawJobResult,
    },

    /// `processing -> failure` with the classified error.
    Fail {
        worker_id: WorkerId,
        error: JobFailure,
    },

    /// `processing -> pending`, consuming one retry. Progress resets to
    /// the floor chosen by the retry policy — the one sanctioned decrease.
    RequeueForRetry {
        worker_id: WorkerId,
        progress_floor: f64,
    },

    /// `processing -> pending` after a lease expired (crashed or stalled
    /// worker). Does not consume a retry; progress restarts from zero
    /// because the in-flight run's scratch state is lost.
    Redeliver { worker_id: WorkerId },

    /// `pending|processing -> cancelled`, recorded by a worker observing
    /// `cancel_requested` at a checkpoint (or directly after leasing).
    MarkCancelled,

    /// Set `cancel_requested`. Rejected once the job is terminal.
    RequestCancel,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Concurrent keyed store for [`JobRecord`]s.
#[derive(Default)]
pub struct JobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created record.
    pub async fn create(&self, record: JobRecord) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(CoreError::Internal(format!(
                "Duplicate job id: {}",
                record.id
            )));
        }
        records.insert(record.id, record);
        Ok(())
    }

    /// Fetch an immutable snapshot of a record.
    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Apply a validated mutation, returning the updated snapshot.
    pub async fn apply(&self, id: JobId, mutation: JobMutation) -> Result<JobRecord, CoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        apply_mutation(record, mutation)?;
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    /// One page of a user's jobs, newest first, with the unpaged total.
    pub async fn list(&self, user_id: &str, query: &JobListQuery) -> JobListPage {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
        let page = query.page.unwrap_or(1).max(1) as usize;

        let records = self.records.read().await;
        let mut jobs: Vec<&JobRecord> = records
            .values()
            .filter(|r| r.submitted_by == user_id)
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = jobs.len();
        let jobs = jobs
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .map(|r| r.snapshot())
            .collect();

        JobListPage { jobs, total }
    }

    /// Job counts by status, across all users.
    pub async fn stats(&self) -> JobStats {
        let records = self.records.read().await;
        let mut stats = JobStats::default();
        for record in records.values() {
            match record.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failure => stats.failure += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Mutation validation
// ---------------------------------------------------------------------------

/// Reject execution writes from anyone but the current lease holder.
fn check_owner(record: &JobRecord, worker_id: WorkerId) -> Result<(), CoreError> {
    if record.worker_id != Some(worker_id) {
        return Err(CoreError::Conflict(format!(
            "Worker {worker_id} no longer owns job {}",
            record.id
        )));
    }
    Ok(())
}

fn apply_mutation(record: &mut JobRecord, mutation: JobMutation) -> Result<(), CoreError> {
    match mutation {
        JobMutation::MarkProcessing { worker_id } => {
            record.status.validate_transition(JobStatus::Processing)?;
            record.status = JobStatus::Processing;
            record.worker_id = Some(worker_id);
            record.started_at = Some(chrono::Utc::now());
        }

        JobMutation::Progress {
            worker_id,
            progress,
            message,
        } => {
            if record.status != JobStatus::Processing {
                return Err(CoreError::Conflict(format!(
                    "Progress write against {} job {}",
                    record.status.as_str(),
                    record.id
                )));
            }
            check_owner(record, worker_id)?;
            if progress < record.progress {
                return Err(CoreError::Conflict(format!(
                    "Progress may not decrease ({} -> {progress})",
                    record.progress
                )));
            }
            record.progress = progress.clamp(0.0, 1.0);
            record.progress_message = message;
        }

        JobMutation::Complete { worker_id, result } => {
            record.status.validate_transition(JobStatus::Success)?;
            check_owner(record, worker_id)?;
            record.status = JobStatus::Success;
            record.progress = 1.0;
            record.result = Some(result);
            record.worker_id = None;
            record.completed_at = Some(chrono::Utc::now());
        }

        JobMutation::Fail { worker_id, error } => {
            record.status.validate_transition(JobStatus::Failure)?;
            check_owner(record, worker_id)?;
            record.status = JobStatus::Failure;
            record.error = Some(error);
            record.worker_id = None;
            record.completed_at = Some(chrono::Utc::now());
        }

        JobMutation::RequeueForRetry {
            worker_id,
            progress_floor,
        } => {
            record.status.validate_transition(JobStatus::Pending)?;
            check_owner(record, worker_id)?;
            record.status = JobStatus::Pending;
            record.retry_count += 1;
            record.progress = progress_floor.clamp(0.0, 1.0);
            record.worker_id = None;
        }

        JobMutation::Redeliver { worker_id } => {
            match record.status {
                JobStatus::Processing => {
                    check_owner(record, worker_id)?;
                    record.status = JobStatus::Pending;
                    record.progress = 0.0;
                    record.progress_message =
                        Some("Re-queued after worker lease expired".to_string());
                    record.worker_id = None;
                }
                // Lease acquired but execution never started; just detach.
                JobStatus::Pending => {
                    record.worker_id = None;
                }
                _ => {
                    return Err(CoreError::Conflict(format!(
                        "Job {} is {} and cannot be re-delivered",
                        record.id,
                        record.status.as_str()
                    )));
                }
            }
        }

        JobMutation::MarkCancelled => {
            record.status.validate_transition(JobStatus::Cancelled)?;
            record.status = JobStatus::Cancelled;
            record.worker_id = None;
            record.completed_at = Some(chrono::Utc::now());
        }

        JobMutation::RequestCancel => {
            if record.status.is_terminal() {
                return Err(CoreError::Conflict(
                    "Job is already in a terminal state and cannot be cancelled".to_string(),
                ));
            }
            record.cancel_requested = true;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
