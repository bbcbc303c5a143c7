//! Job record, queue entry, lease, and request/response DTOs.

use serde::{Deserialize, Serialize};
use validator::Validate;

use scenecast_core::job::{JobFailure, JobSnapshot, JobStatus, RawJobResult, PRIORITY_NORMAL};
use scenecast_core::types::{JobId, Timestamp};

/// Workers are identified by their index in the pool.
pub type WorkerId = u32;

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// The authoritative state of one job. Only the store hands these out,
/// and only as cloned snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: String,
    pub status: JobStatus,
    pub submitted_by: String,
    pub priority: i32,
    /// Caller-supplied work description, opaque to the engine.
    pub parameters: serde_json::Value,
    /// Fraction of work completed, in `[0.0, 1.0]`.
    pub progress: f64,
    pub progress_message: Option<String>,
    pub cancel_requested: bool,
    /// Automatic retries already consumed.
    pub retry_count: u32,
    /// Worker currently assigned, while a lease is held.
    pub worker_id: Option<WorkerId>,
    pub result: Option<RawJobResult>,
    pub error: Option<JobFailure>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Create a fresh pending record for an accepted submission.
    pub fn new(submitted_by: &str, input: &SubmitJob) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            job_type: input.job_type.clone(),
            status: JobStatus::Pending,
            submitted_by: submitted_by.to_string(),
            priority: input.priority.unwrap_or(PRIORITY_NORMAL),
            parameters: input.parameters.clone(),
            progress: 0.0,
            progress_message: None,
            cancel_requested: false,
            retry_count: 0,
            worker_id: None,
            result: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// The caller-visible view of this record.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            progress_message: self.progress_message.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            retry_count: self.retry_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission DTO
// ---------------------------------------------------------------------------

/// DTO for submitting a new job via `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitJob {
    #[validate(length(min = 1, max = 64))]
    pub job_type: String,
    /// Must be a JSON object; contents are passed to the pipeline as-is.
    pub parameters: serde_json::Value,
    pub priority: Option<i32>,
}

// ---------------------------------------------------------------------------
// Listing and stats
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<u32>,
    /// Page size. Defaults to 50, capped at 100.
    pub limit: Option<u32>,
}

/// Default page size for job listing.
pub const DEFAULT_LIMIT: u32 = 50;

/// Maximum page size for job listing.
pub const MAX_LIMIT: u32 = 100;

/// One page of a caller's jobs.
#[derive(Debug, Serialize)]
pub struct JobListPage {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
}

/// Job counts by status.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub failure: usize,
    pub cancelled: usize,
}

// ---------------------------------------------------------------------------
// Queue entry and lease
// ---------------------------------------------------------------------------

/// A job awaiting a worker. Exists only while the job is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub job_id: JobId,
    pub priority: i32,
    pub enqueued_at: Timestamp,
}

impl Ord for QueueEntry {
    /// Heap order: higher priority first, then earlier enqueue time.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A worker's time-bounded ownership claim over a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub expires_at: Timestamp,
}

impl Lease {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(priority: i32, offset_secs: i64) -> QueueEntry {
        QueueEntry {
            job_id: uuid::Uuid::now_v7(),
            priority,
            enqueued_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn higher_priority_orders_first() {
        let urgent = entry(10, 10);
        let normal = entry(0, 0);
        assert!(urgent > normal);
    }

    #[test]
    fn equal_priority_orders_by_enqueue_time() {
        let early = entry(0, 0);
        let late = entry(0, 60);
        assert!(early > late);
    }

    #[test]
    fn lease_expiry_is_inclusive() {
        let now = Utc::now();
        let lease = Lease {
            job_id: uuid::Uuid::now_v7(),
            worker_id: 0,
            expires_at: now,
        };
        assert!(lease.is_expired(now));
        assert!(!lease.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn new_record_starts_pending_at_zero_progress() {
        let input = SubmitJob {
            job_type: "video_render".into(),
            parameters: serde_json::json!({"script_id": 7}),
            priority: Some(5),
        };
        let record = JobRecord::new("user-1", &input);

        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0.0);
        assert_eq!(record.priority, 5);
        assert_eq!(record.retry_count, 0);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert!(!record.cancel_requested);
    }

    #[test]
    fn snapshot_mirrors_record_fields() {
        let input = SubmitJob {
            job_type: "video_render".into(),
            parameters: serde_json::json!({}),
            priority: None,
        };
        let record = JobRecord::new("user-1", &input);
        let snapshot = record.snapshot();

        assert_eq!(snapshot.job_id, record.id);
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.retry_count, 0);
    }
}
