//! Retry policy for transient worker failures.
//!
//! Expressed as an explicit value object so the limit, the backoff curve,
//! and the progress-reset behaviour are all independently testable and
//! tunable from configuration rather than buried in worker conditionals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Retryable: a dependency was temporarily unavailable.
    Transient,
    /// Not retryable: bad input detected mid-pipeline, or retries exhausted.
    Permanent,
}

// ---------------------------------------------------------------------------
// Backoff schedule
// ---------------------------------------------------------------------------

/// Tunable parameters for the exponential-backoff curve used between
/// retry re-enqueues.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on the delay between retries.
    pub max: Duration,
    /// Factor by which the delay grows after each retry.
    pub multiplier: f64,
    /// Fraction of random jitter added on top of the computed delay,
    /// in `0.0..=1.0`. Zero disables jitter.
    pub jitter_frac: f64,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_frac: 0.1,
        }
    }
}

impl BackoffSchedule {
    /// Deterministic delay for the given retry ordinal (0-based), without
    /// jitter. Clamped to [`BackoffSchedule::max`].
    pub fn base_delay(&self, retry: u32) -> Duration {
        let ms = self.initial.as_millis() as f64 * self.multiplier.powi(retry as i32);
        Duration::from_millis(ms as u64).min(self.max)
    }

    /// Delay for the given retry ordinal with jitter applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter_frac <= 0.0 {
            return base;
        }
        let jitter_ms = base.as_millis() as f64 * self.jitter_frac * rand::random::<f64>();
        base + Duration::from_millis(jitter_ms as u64)
    }
}

// ---------------------------------------------------------------------------
// Progress reset behaviour
// ---------------------------------------------------------------------------

/// What happens to a job's reported progress when a transient failure
/// sends it back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressReset {
    /// Reset to `0.0`; the restarted run reports from scratch.
    Zero,
    /// Reset to the boundary value of the last fully completed stage.
    /// Valid when stage outputs are keyed by `(job_id, stage)` and a re-run
    /// can skip or cheaply redo completed stages.
    StageFloor,
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Policy governing automatic retries of transient worker failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of automatic retries per job.
    pub max_retries: u32,
    /// Backoff curve between retries.
    pub backoff: BackoffSchedule,
    /// Progress value recorded at retry re-enqueue.
    pub progress_reset: ProgressReset,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffSchedule::default(),
            progress_reset: ProgressReset::StageFloor,
        }
    }
}

impl RetryPolicy {
    /// Map a raw pipeline error to its retry classification.
    pub fn classify(&self, err: &PipelineError) -> ErrorClass {
        match err {
            PipelineError::Transient(_) => ErrorClass::Transient,
            PipelineError::Permanent(_) => ErrorClass::Permanent,
        }
    }

    /// Whether a failure with the given classification should be retried,
    /// given the number of retries already consumed.
    pub fn should_retry(&self, class: ErrorClass, retry_count: u32) -> bool {
        class == ErrorClass::Transient && retry_count < self.max_retries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- backoff --------------------------------------------------------------

    #[test]
    fn base_delay_doubles() {
        let schedule = BackoffSchedule::default();
        assert_eq!(schedule.base_delay(1), Duration::from_secs(2));
    }

    #[test]
    fn base_delay_clamps_at_max() {
        let schedule = BackoffSchedule::default();
        assert_eq!(schedule.base_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn full_backoff_sequence() {
        let schedule = BackoffSchedule::default();
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for (retry, &expected_secs) in expected.iter().enumerate() {
            assert_eq!(schedule.base_delay(retry as u32).as_secs(), expected_secs);
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let schedule = BackoffSchedule::default();
        for _ in 0..100 {
            let d = schedule.delay_for(2);
            let base = schedule.base_delay(2);
            assert!(d >= base);
            assert!(d <= base + Duration::from_millis((base.as_millis() as f64 * 0.1) as u64 + 1));
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let schedule = BackoffSchedule {
            jitter_frac: 0.0,
            ..Default::default()
        };
        assert_eq!(schedule.delay_for(3), schedule.base_delay(3));
    }

    // -- classification and limits --------------------------------------------

    #[test]
    fn transient_errors_classified_transient() {
        let policy = RetryPolicy::default();
        let err = PipelineError::Transient("voice provider 503".into());
        assert_eq!(policy.classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn permanent_errors_classified_permanent() {
        let policy = RetryPolicy::default();
        let err = PipelineError::Permanent("script references unknown template".into());
        assert_eq!(policy.classify(&err), ErrorClass::Permanent);
    }

    #[test]
    fn retries_allowed_below_max() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(ErrorClass::Transient, 0));
        assert!(policy.should_retry(ErrorClass::Transient, 2));
    }

    #[test]
    fn retries_refused_at_max() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ErrorClass::Transient, 3));
    }

    #[test]
    fn permanent_never_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ErrorClass::Permanent, 0));
    }
}
