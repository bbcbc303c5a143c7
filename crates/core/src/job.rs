//! Job status, the lifecycle state machine, and shared wire types.
//!
//! The state machine here is authoritative: the engine's record store
//! rejects any mutation whose status transition is not listed in
//! [`JobStatus::valid_transitions`], so no component can move a job
//! backward or resurrect a terminal job.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::retry::ErrorClass;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority value for urgent jobs. Dequeued before all others.
pub const PRIORITY_URGENT: i32 = 10;

/// Priority value for normal jobs. Default.
pub const PRIORITY_NORMAL: i32 = 0;

/// Priority value for background jobs. Dequeued last.
pub const PRIORITY_BACKGROUND: i32 = -10;

// ---------------------------------------------------------------------------
// Status and state machine
// ---------------------------------------------------------------------------

/// Background job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failure,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses permit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failure | JobStatus::Cancelled
        )
    }

    /// Returns the set of valid target statuses reachable from `self`.
    ///
    /// `Processing -> Pending` is the transient-retry re-enqueue edge; it is
    /// internal and externally indistinguishable from a fresh `pending`.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Processing, JobStatus::Cancelled],
            JobStatus::Processing => &[
                JobStatus::Success,
                JobStatus::Failure,
                JobStatus::Cancelled,
                JobStatus::Pending,
            ],
            JobStatus::Success | JobStatus::Failure | JobStatus::Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a state transition, returning a `Conflict` for invalid ones.
    pub fn validate_transition(self, to: JobStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid transition: {} -> {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }

    /// Lowercase name as serialized on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// Result and failure payloads
// ---------------------------------------------------------------------------

/// Raw result recorded when a job completes successfully.
///
/// Locators use the internal `artifact://` scheme and are never returned to
/// callers directly; see [`crate::resolver`] for the external mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJobResult {
    /// Internal locator of the finished video.
    pub video_locator: String,
    /// Internal locator of the preview artifact, if one was produced.
    pub preview_locator: Option<String>,
    /// Duration of the finished video in seconds.
    pub duration_secs: f64,
    /// Size of the primary artifact in bytes.
    pub size_bytes: u64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

/// Classified error recorded when a job fails terminally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// How the final error was classified.
    pub class: ErrorClass,
    /// Human-readable reason, suitable for display to the submitting user.
    pub message: String,
    /// Name of the stage that failed, when known.
    pub failed_stage: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot wire type
// ---------------------------------------------------------------------------

/// Immutable point-in-time view of a job, shared by the API (serialize)
/// and the polling client (deserialize).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Fraction of work completed, in `[0.0, 1.0]`.
    pub progress: f64,
    pub progress_message: Option<String>,
    /// Present iff `status` is `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RawJobResult>,
    /// Present iff `status` is `failure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub created_at: Timestamp,
    pub retry_count: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
