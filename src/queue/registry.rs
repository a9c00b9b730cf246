//! Canonical job store.
//!
//! The registry owns every job record and enforces the lifecycle state
//! machine on each write. It has no scheduling policy: ordering and admission
//! belong to the dispatcher.

use super::types::{Job, JobOutput, JobPayload, StatusUpdate};
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use convertd_common::{Error, JobId, JobStatus, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
    next_seq: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Register a new `queued` job stamped with the current time.
    pub fn create(&self, tool: &str, payload: JobPayload) -> Job {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let job = Job::new(seq, tool, payload, self.clock.now());

        let mut jobs = self.jobs.write();
        jobs.insert(job.id, job.clone());
        job
    }

    /// Get a job by ID
    pub fn get(&self, id: JobId) -> Result<Job> {
        let jobs = self.jobs.read();
        jobs.get(&id).cloned().ok_or_else(|| Error::not_found(id))
    }

    /// Apply a lifecycle transition under the write lock.
    ///
    /// An illegal transition returns [`Error::InvariantViolation`] and leaves
    /// the record exactly as it was.
    pub fn update_status(&self, id: JobId, update: StatusUpdate) -> Result<Job> {
        self.update_status_then(id, update, |_| {})
    }

    /// Like [`update_status`](Self::update_status), but runs `on_commit` on
    /// the new record before the write lock is released.
    ///
    /// Readers never see the new status without whatever `on_commit` did.
    /// `on_commit` is skipped when the transition is rejected.
    pub fn update_status_then(
        &self,
        id: JobId,
        update: StatusUpdate,
        on_commit: impl FnOnce(&Job),
    ) -> Result<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or_else(|| Error::not_found(id))?;

        // Work on a copy so a rejected update can never leave a torn record.
        let mut next = job.clone();
        next.apply(update)?;
        *job = next;
        on_commit(job);
        Ok(job.clone())
    }

    /// All jobs in `status`, oldest submission first.
    pub fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        let jobs = self.jobs.read();
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|job| job.seq);
        matching
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        let jobs = self.jobs.read();
        jobs.values().filter(|job| job.status == status).count()
    }

    /// Number of `queued` jobs submitted strictly before `seq`.
    pub fn count_queued_before(&self, seq: u64) -> usize {
        let jobs = self.jobs.read();
        jobs.values()
            .filter(|job| job.status == JobStatus::Queued && job.seq < seq)
            .count()
    }

    /// Hand the conversion output over to the caller, releasing it from the job.
    ///
    /// Returns `Ok(None)` once the output has already been taken.
    pub fn take_output(&self, id: JobId) -> Result<Option<JobOutput>> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or_else(|| Error::not_found(id))?;
        Ok(job.output.take())
    }

    /// Drop terminal jobs that finished before `cutoff`.
    pub fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.is_some_and(|at| at < cutoff))
        });
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
