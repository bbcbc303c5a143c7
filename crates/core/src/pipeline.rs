//! The seam between the job engine and the opaque generation pipeline.
//!
//! The engine drives a [`Pipeline`] stage by stage. Each stage contributes
//! a known fraction of overall progress, and stage boundaries are the
//! checkpoints at which the worker reports progress, renews its lease, and
//! observes cancellation.
//!
//! Delivery is at-least-once: a stage may be re-run after a lease expiry
//! or a transient retry. Implementations must key externally visible side
//! effects by [`StageContext::idempotency_key`] so a re-run is safe.

use async_trait::async_trait;

use crate::job::RawJobResult;
use crate::types::JobId;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// A named unit of pipeline work with a relative progress weight.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    /// Relative weight of this stage. Weights are normalized over the
    /// whole plan, so they need not sum to 1.0.
    pub weight: f64,
}

impl Stage {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Cumulative progress fraction after `completed` stages of `stages`
/// have finished, normalized to `[0.0, 1.0]`.
pub fn progress_after(stages: &[Stage], completed: usize) -> f64 {
    let total: f64 = stages.iter().map(|s| s.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let done: f64 = stages.iter().take(completed).map(|s| s.weight).sum();
    (done / total).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure raised by a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A dependency was temporarily unavailable; the job may be retried.
    #[error("Transient pipeline failure: {0}")]
    Transient(String),

    /// The input cannot be processed; retrying will not help.
    #[error("Permanent pipeline failure: {0}")]
    Permanent(String),
}

// ---------------------------------------------------------------------------
// Stage execution
// ---------------------------------------------------------------------------

/// Everything a stage needs to run.
#[derive(Debug)]
pub struct StageContext<'a> {
    pub job_id: JobId,
    /// Zero-based index of the stage being executed.
    pub stage_index: usize,
    /// Name of the stage being executed.
    pub stage_name: &'a str,
    /// Number of automatic retries already consumed by this job.
    pub retry_count: u32,
    /// The caller-supplied work description, opaque to the engine.
    pub parameters: &'a serde_json::Value,
    /// Data produced by earlier stages of this run.
    pub scratch: &'a serde_json::Value,
}

impl StageContext<'_> {
    /// Deterministic key for deduplicating a stage's side effects across
    /// re-runs of the same job. Stable across retries and re-deliveries.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.job_id, self.stage_index)
    }
}

/// What a completed stage hands back to the engine.
#[derive(Debug)]
pub struct StageOutcome {
    /// Data for subsequent stages; threaded through as
    /// [`StageContext::scratch`].
    pub scratch: serde_json::Value,
    /// The job result. Must be `Some` from the final stage, `None` before.
    pub result: Option<RawJobResult>,
}

/// The opaque, resumable generation pipeline a worker drives.
///
/// Stage boundaries are the engine's checkpoints; keep stages coarse
/// enough to amortize checkpoint overhead and fine enough that
/// cancellation latency stays acceptable.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// The ordered stage plan for a job with the given parameters.
    fn stages(&self, parameters: &serde_json::Value) -> Vec<Stage>;

    /// Execute a single stage to completion.
    async fn execute_stage(&self, ctx: StageContext<'_>) -> Result<StageOutcome, PipelineError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
