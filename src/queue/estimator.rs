//! Queue position and wait-time estimates.
//!
//! Both queries are read-only over the registry and duration tracker; they
//! never take a write lock and never wait on running conversions.

use super::durations::DurationTracker;
use super::registry::JobRegistry;
use super::types::Job;
use convertd_common::{JobId, JobStatus, Result};
use std::time::Duration;

pub struct Estimator<'a> {
    registry: &'a JobRegistry,
    durations: &'a DurationTracker,
    workers: usize,
}

impl<'a> Estimator<'a> {
    pub fn new(registry: &'a JobRegistry, durations: &'a DurationTracker, workers: usize) -> Self {
        Self {
            registry,
            durations,
            workers: workers.max(1),
        }
    }

    /// Number of queued jobs submitted strictly before `id`.
    ///
    /// Jobs already processing are not counted: they free their worker no
    /// matter where the waiting job sits. Non-queued jobs are at position 0.
    pub fn position(&self, id: JobId) -> Result<usize> {
        let job = self.registry.get(id)?;
        Ok(self.estimate(&job).0)
    }

    /// `ceil(position / workers) * mean duration of the job's tool`.
    ///
    /// Jobs ahead drain in batches of one per worker. Zero for any job that
    /// is no longer queued.
    pub fn estimated_wait(&self, id: JobId) -> Result<Duration> {
        let job = self.registry.get(id)?;
        Ok(self.estimate(&job).1)
    }

    /// Position and wait for an already-fetched record, so a status report
    /// never mixes two different reads of the same job.
    pub fn estimate(&self, job: &Job) -> (usize, Duration) {
        if job.status != JobStatus::Queued {
            return (0, Duration::ZERO);
        }
        let position = self.registry.count_queued_before(job.seq);
        (position, self.wait_for(position, &job.tool))
    }

    fn wait_for(&self, position: usize, tool: &str) -> Duration {
        let batches = u32::try_from(position.div_ceil(self.workers)).unwrap_or(u32::MAX);
        self.durations
            .estimate(tool)
            .checked_mul(batches)
            .unwrap_or(Duration::MAX)
    }
}

/// Whole seconds, rounded up, for client-facing wait estimates.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
