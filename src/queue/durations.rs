//! Rolling per-tool processing time history.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Samples kept per tool unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Estimate used for a tool that has never completed a job.
pub const DEFAULT_FALLBACK_ESTIMATE: Duration = Duration::from_secs(30);

pub struct DurationTracker {
    windows: RwLock<HashMap<String, VecDeque<Duration>>>,
    capacity: usize,
    fallback: Duration,
}

impl DurationTracker {
    pub fn new(capacity: usize, fallback: Duration) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            fallback,
        }
    }

    /// Add a successful run's duration, evicting the oldest sample when full.
    pub fn record(&self, tool: &str, duration: Duration) {
        let mut windows = self.windows.write();
        let window = windows
            .entry(tool.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        window.push_back(duration);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Mean of the tool's window, or the fallback when it has no samples.
    pub fn estimate(&self, tool: &str) -> Duration {
        let windows = self.windows.read();
        match windows.get(tool) {
            Some(window) if !window.is_empty() => {
                let total: Duration = window.iter().sum();
                total / window.len() as u32
            }
            _ => self.fallback,
        }
    }

    pub fn sample_count(&self, tool: &str) -> usize {
        self.windows.read().get(tool).map_or(0, VecDeque::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DurationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_FALLBACK_ESTIMATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fallback_without_samples() {
        let tracker = DurationTracker::new(5, Duration::from_secs(42));
        assert_eq!(tracker.estimate("video"), Duration::from_secs(42));
        assert_eq!(tracker.sample_count("video"), 0);
    }

    #[test]
    fn test_mean_of_samples() {
        let tracker = DurationTracker::default();
        tracker.record("video", Duration::from_secs(10));
        tracker.record("video", Duration::from_secs(20));
        tracker.record("video", Duration::from_secs(30));
        assert_eq!(tracker.estimate("video"), Duration::from_secs(20));
    }

    #[test]
    fn test_tools_are_independent() {
        let tracker = DurationTracker::new(5, Duration::from_secs(1));
        tracker.record("video", Duration::from_secs(100));
        assert_eq!(tracker.estimate("ocr"), Duration::from_secs(1));
        assert_eq!(tracker.estimate("video"), Duration::from_secs(100));
    }

    #[test]
    fn test_oldest_sample_evicted_past_capacity() {
        let tracker = DurationTracker::new(3, Duration::ZERO);
        for secs in [100, 1, 2, 3] {
            tracker.record("pdf", Duration::from_secs(secs));
        }
        assert_eq!(tracker.sample_count("pdf"), 3);
        assert_eq!(tracker.estimate("pdf"), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let tracker = DurationTracker::new(0, Duration::ZERO);
        tracker.record("pdf", Duration::from_secs(4));
        assert_eq!(tracker.capacity(), 1);
        assert_eq!(tracker.estimate("pdf"), Duration::from_secs(4));
    }

    #[test]
    fn test_concurrent_record_and_estimate() {
        let tracker = Arc::new(DurationTracker::new(50, Duration::from_secs(1)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record("video", Duration::from_secs(2));
                        assert_eq!(tracker.estimate("video"), Duration::from_secs(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.sample_count("video"), 50);
    }
}
