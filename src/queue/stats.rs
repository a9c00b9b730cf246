//! Queue counters.
//!
//! Live counts (queued, active) come from the registry. Cumulative outcome
//! counters are bumped by the dispatcher on every terminal transition, so a
//! snapshot never has to scan finished history.

use super::registry::JobRegistry;
use super::types::QueueStats;
use convertd_common::JobStatus;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatsAggregator {
    success_count: AtomicU64,
    error_count: AtomicU64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, registry: &JobRegistry) -> QueueStats {
        let success_count = self.success_count.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);
        let total_processed = success_count + error_count;

        QueueStats {
            active_count: registry.count_by_status(JobStatus::Processing),
            queued_count: registry.count_by_status(JobStatus::Queued),
            total_processed,
            success_count,
            error_count,
            success_rate: success_rate(success_count, total_processed),
        }
    }
}

/// Percentage of successful jobs; 100 when nothing has finished yet.
pub fn success_rate(success: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let rate = (success as f64 / total as f64) * 100.0;
    rate.clamp(0.0, 100.0)
}
