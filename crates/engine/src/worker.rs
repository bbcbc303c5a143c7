//! Worker pool execution loop.
//!
//! Each worker owns at most one job at a time via its lease. Stage
//! boundaries are checkpoints: the worker reports progress, renews its
//! lease, and observes cancellation there. Cancellation is advisory, not
//! preemptive — latency is bounded by stage granularity.
//!
//! A checkpoint write rejected by the store (stale worker, lost lease)
//! means another worker owns the job now; the loop abandons it without
//! touching the record further.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use scenecast_core::job::JobFailure;
use scenecast_core::pipeline::{progress_after, Pipeline, PipelineError, Stage, StageContext};
use scenecast_core::retry::{ErrorClass, ProgressReset, RetryPolicy};
use scenecast_core::types::JobId;

use crate::models::{JobRecord, QueueEntry, WorkerId};
use crate::queue::JobQueue;
use crate::store::{JobMutation, JobStore};

/// Fallback sleep between queue polls when no wake-up notification lands.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A bounded set of independent job executors.
pub struct WorkerPool {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    pipeline: Arc<dyn Pipeline>,
    policy: RetryPolicy,
}

impl WorkerPool {
    pub fn new(
        store: Arc<JobStore>,
        queue: Arc<JobQueue>,
        pipeline: Arc<dyn Pipeline>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            pipeline,
            policy,
        }
    }

    /// Spawn `count` worker tasks. Each runs until `cancel` is triggered.
    pub fn spawn(self: Arc<Self>, count: u32, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker_id| {
                let pool = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { pool.worker_loop(worker_id, cancel).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: WorkerId, cancel: CancellationToken) {
        tracing::info!(worker_id, "Worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.queue.lease_next(worker_id).await {
                Some(lease) => self.run_job(worker_id, lease.job_id, &cancel).await,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.queue.wait_for_work() => {}
                        _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                    }
                }
            }
        }

        tracing::info!(worker_id, "Worker stopped");
    }

    async fn run_job(&self, worker_id: WorkerId, job_id: JobId, cancel: &CancellationToken) {
        let Some(record) = self.store.get(job_id).await else {
            tracing::warn!(%job_id, worker_id, "Leased job has no record; dropping lease");
            self.queue.release(job_id, worker_id).await;
            return;
        };

        // Cancel accepted while pending: record `cancelled` without ever
        // entering `processing`.
        if record.cancel_requested {
            self.finish_cancelled(job_id, worker_id).await;
            return;
        }

        let record = match self
            .store
            .apply(job_id, JobMutation::MarkProcessing { worker_id })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%job_id, worker_id, error = %e, "Could not start leased job");
                self.queue.release(job_id, worker_id).await;
                return;
            }
        };

        tracing::info!(
            %job_id,
            worker_id,
            job_type = %record.job_type,
            retry_count = record.retry_count,
            "Job execution started",
        );

        let stages = self.pipeline.stages(&record.parameters);
        let mut scratch = serde_json::Value::Null;

        for (index, stage) in stages.iter().enumerate() {
            // Checkpoint: observe cancellation and keep the lease alive
            // before entering the stage.
            match self.store.get(job_id).await {
                Some(current) if current.cancel_requested => {
                    self.finish_cancelled(job_id, worker_id).await;
                    return;
                }
                Some(_) => {}
                None => {
                    tracing::warn!(%job_id, worker_id, "Job record vanished mid-run");
                    self.queue.release(job_id, worker_id).await;
                    return;
                }
            }
            if let Err(e) = self.queue.renew(job_id, worker_id).await {
                tracing::warn!(%job_id, worker_id, error = %e, "Lease lost; abandoning job");
                return;
            }

            let ctx = StageContext {
                job_id,
                stage_index: index,
                stage_name: &stage.name,
                retry_count: record.retry_count,
                parameters: &record.parameters,
                scratch: &scratch,
            };

            match self.pipeline.execute_stage(ctx).await {
                Ok(outcome) => {
                    if let Some(result) = outcome.result {
                        match self
                            .store
                            .apply(job_id, JobMutation::Complete { worker_id, result })
                            .await
                        {
                            Ok(_) => tracing::info!(%job_id, worker_id, "Job completed"),
                            Err(e) => {
                                tracing::warn!(%job_id, worker_id, error = %e, "Completion rejected")
                            }
                        }
                        self.queue.release(job_id, worker_id).await;
                        return;
                    }

                    scratch = outcome.scratch;
                    // A retried run re-executes earlier stages; progress
                    // holds at the recorded floor until the run catches up.
                    let progress = progress_after(&stages, index + 1).max(record.progress);
                    if let Err(e) = self
                        .store
                        .apply(
                            job_id,
                            JobMutation::Progress {
                                worker_id,
                                progress,
                                message: Some(stage.name.clone()),
                            },
                        )
                        .await
                    {
                        tracing::warn!(%job_id, worker_id, error = %e, "Progress write rejected; abandoning job");
                        self.queue.release(job_id, worker_id).await;
                        return;
                    }
                }
                Err(err) => {
                    self.handle_stage_failure(worker_id, &record, &stages, index, err, cancel)
                        .await;
                    return;
                }
            }
        }

        // The stage plan ran out without a final-stage result.
        let failure = JobFailure {
            class: ErrorClass::Permanent,
            message: "Pipeline finished without producing a result".to_string(),
            failed_stage: stages.last().map(|s| s.name.clone()),
        };
        if let Err(e) = self
            .store
            .apply(
                job_id,
                JobMutation::Fail {
                    worker_id,
                    error: failure,
                },
            )
            .await
        {
            tracing::warn!(%job_id, worker_id, error = %e, "Failure write rejected");
        }
        self.queue.release(job_id, worker_id).await;
    }

    async fn handle_stage_failure(
        &self,
        worker_id: WorkerId,
        record: &JobRecord,
        stages: &[Stage],
        index: usize,
        err: PipelineError,
        cancel: &CancellationToken,
    ) {
        let job_id = record.id;
        let class = self.policy.classify(&err);

        if self.policy.should_retry(class, record.retry_count) {
            let progress_floor = match self.policy.progress_reset {
                ProgressReset::Zero => 0.0,
                ProgressReset::StageFloor => progress_after(stages, index),
            };
            match self
                .store
                .apply(
                    job_id,
                    JobMutation::RequeueForRetry {
                        worker_id,
                        progress_floor,
                    },
                )
                .await
            {
                Ok(updated) => {
                    let delay = self.policy.backoff.delay_for(record.retry_count);
                    tracing::warn!(
                        %job_id,
                        worker_id,
                        stage = %stages[index].name,
                        retry_count = updated.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient stage failure; re-queueing",
                    );
                    self.queue.release(job_id, worker_id).await;
                    self.requeue_after(job_id, updated.priority, delay, cancel.clone());
                }
                Err(e) => {
                    tracing::warn!(%job_id, worker_id, error = %e, "Retry re-queue rejected");
                    self.queue.release(job_id, worker_id).await;
                }
            }
            return;
        }

        let failure = JobFailure {
            class,
            message: err.to_string(),
            failed_stage: Some(stages[index].name.clone()),
        };
        match self
            .store
            .apply(
                job_id,
                JobMutation::Fail {
                    worker_id,
                    error: failure,
                },
            )
            .await
        {
            Ok(_) => tracing::error!(
                %job_id,
                worker_id,
                stage = %stages[index].name,
                error = %err,
                "Job failed",
            ),
            Err(e) => tracing::warn!(%job_id, worker_id, error = %e, "Failure write rejected"),
        }
        self.queue.release(job_id, worker_id).await;
    }

    /// Put the job back on the queue at the same priority after the
    /// backoff delay, unless the engine shuts down first.
    fn requeue_after(
        &self,
        job_id: JobId,
        priority: i32,
        delay: Duration,
        cancel: CancellationToken,
    ) {
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    queue
                        .enqueue(QueueEntry {
                            job_id,
                            priority,
                            enqueued_at: chrono::Utc::now(),
                        })
                        .await;
                }
            }
        });
    }

    async fn finish_cancelled(&self, job_id: JobId, worker_id: WorkerId) {
        match self.store.apply(job_id, JobMutation::MarkCancelled).await {
            Ok(_) => tracing::info!(%job_id, worker_id, "Job cancelled at checkpoint"),
            Err(e) => tracing::warn!(%job_id, worker_id, error = %e, "Cancel transition rejected"),
        }
        self.queue.release(job_id, worker_id).await;
    }
}
