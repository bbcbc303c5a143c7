//! Priority queue and lease table.
//!
//! Entries are ordered `(priority desc, enqueued_at asc)`. Dequeue and
//! lease creation happen under one lock so two workers can never acquire
//! the same entry. A lease that expires before the worker acknowledges
//! completion makes the job eligible for re-delivery — at-least-once
//! semantics, by design.

use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use scenecast_core::error::CoreError;
use scenecast_core::types::{JobId, Timestamp};

use crate::models::{Lease, QueueEntry, WorkerId};

struct QueueInner {
    entries: BinaryHeap<QueueEntry>,
    leases: HashMap<JobId, Lease>,
}

/// Ordered, in-process holding area for jobs awaiting a worker.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    lease_ttl: Duration,
}

impl JobQueue {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                entries: BinaryHeap::new(),
                leases: HashMap::new(),
            }),
            notify: Notify::new(),
            lease_ttl,
        }
    }

    /// Add an entry and wake one idle worker.
    pub async fn enqueue(&self, entry: QueueEntry) {
        {
            let mut inner = self.inner.lock().await;
            inner.entries.push(entry);
        }
        self.notify.notify_one();
    }

    /// Atomically pop the highest-priority entry and record a lease for
    /// `worker_id`. Returns `None` when the queue is empty.
    pub async fn lease_next(&self, worker_id: WorkerId) -> Option<Lease> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entries.pop()?;
        let lease = Lease {
            job_id: entry.job_id,
            worker_id,
            expires_at: chrono::Utc::now() + self.lease_ttl,
        };
        inner.leases.insert(entry.job_id, lease.clone());
        Some(lease)
    }

    /// Park until new work is enqueued.
    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }

    /// Extend the lease at a checkpoint. Fails if the lease was reaped
    /// (or handed to another worker) in the meantime.
    pub async fn renew(&self, job_id: JobId, worker_id: WorkerId) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        match inner.leases.get_mut(&job_id) {
            Some(lease) if lease.worker_id == worker_id => {
                lease.expires_at = chrono::Utc::now() + self.lease_ttl;
                Ok(())
            }
            _ => Err(CoreError::Conflict(format!(
                "Worker {worker_id} no longer holds the lease for job {job_id}"
            ))),
        }
    }

    /// Drop the lease after the worker finishes (or abandons) the job.
    /// A stale release from a superseded worker is a no-op.
    pub async fn release(&self, job_id: JobId, worker_id: WorkerId) {
        let mut inner = self.inner.lock().await;
        if inner
            .leases
            .get(&job_id)
            .is_some_and(|lease| lease.worker_id == worker_id)
        {
            inner.leases.remove(&job_id);
        }
    }

    /// Remove and return every lease that has expired as of `now`.
    /// The caller is responsible for resetting and re-enqueueing the jobs.
    pub async fn reap_expired(&self, now: Timestamp) -> Vec<Lease> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<JobId> = inner
            .leases
            .values()
            .filter(|lease| lease.is_expired(now))
            .map(|lease| lease.job_id)
            .collect();
        expired
            .into_iter()
            .filter_map(|job_id| inner.leases.remove(&job_id))
            .collect()
    }

    /// Number of entries currently awaiting a worker.
    pub async fn depth(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Number of leases currently held.
    pub async fn active_leases(&self) -> usize {
        self.inner.lock().await.leases.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
