//! In-memory conversion queue.
//!
//! [`QueueManager`] is the only entry point the rest of the service uses. It
//! wires together the job registry, the duration history, the outcome
//! counters and the worker pool, and exposes submission and status queries.
//!
//! ```no_run
//! use convertd::clock::SystemClock;
//! use convertd::config::{QueueConfig, ToolConfig};
//! use convertd::executor::CommandExecutor;
//! use convertd::queue::{JobPayload, QueueManager};
//! use std::sync::Arc;
//!
//! # async fn example(tools: Vec<ToolConfig>) -> convertd_common::Result<()> {
//! let executor = Arc::new(CommandExecutor::new(&tools, "/var/lib/convertd"));
//! let queue = QueueManager::new(&QueueConfig::default(), executor, Arc::new(SystemClock));
//! queue.start();
//!
//! let job_id = queue.submit("pdf", JobPayload::new("/uploads/report.docx"))?;
//! let report = queue.status(job_id)?;
//! println!("position {} (~{}s)", report.position, report.estimated_wait);
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod durations;
mod estimator;
mod events;
mod registry;
mod stats;
mod types;

pub use dispatcher::Dispatcher;
pub use durations::{DurationTracker, DEFAULT_FALLBACK_ESTIMATE, DEFAULT_HISTORY_CAPACITY};
pub use estimator::{ceil_secs, Estimator};
pub use events::{EventBus, QueueEvent};
pub use registry::JobRegistry;
pub use stats::{success_rate, StatsAggregator};
pub use types::{Job, JobOutput, JobPayload, JobStatusReport, QueueStats, StatusUpdate};

use crate::clock::Clock;
use crate::config::QueueConfig;
use crate::executor::Executor;
use convertd_common::{Error, JobId, JobStatus, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// What a caller gets when asking for a job's result.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// The job hasn't finished; carries its current status.
    Pending(JobStatus),
    /// The conversion output, now owned by the caller.
    Ready(JobOutput),
    /// The conversion failed with this message.
    Failed(String),
}

pub struct QueueManager {
    registry: Arc<JobRegistry>,
    durations: Arc<DurationTracker>,
    stats: Arc<StatsAggregator>,
    events: EventBus,
    executor: Arc<dyn Executor>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueManager {
    /// Build an idle queue. Nothing runs until [`start`](Self::start).
    pub fn new(config: &QueueConfig, executor: Arc<dyn Executor>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let registry = Arc::new(JobRegistry::new(clock));
        let durations = Arc::new(DurationTracker::new(
            config.history_capacity,
            config.default_estimate(),
        ));
        let stats = Arc::new(StatsAggregator::new());
        let events = EventBus::new();

        let dispatcher = Dispatcher::new(
            config.clone(),
            Arc::clone(&registry),
            Arc::clone(&durations),
            Arc::clone(&stats),
            events.clone(),
            Arc::clone(&executor),
        );

        Arc::new(Self {
            registry,
            durations,
            stats,
            events,
            executor,
            dispatcher,
        })
    }

    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.dispatcher.start();
    }

    /// Enqueue a conversion and return its id.
    pub fn submit(&self, tool: &str, payload: JobPayload) -> Result<JobId> {
        let tool = tool.trim();
        if tool.is_empty() {
            return Err(Error::invalid_input("tool name is required"));
        }
        if !self.executor.supports(tool) {
            return Err(Error::invalid_input(format!("unknown tool: {tool}")));
        }
        if payload.input.as_os_str().is_empty() {
            return Err(Error::invalid_input("input path is required"));
        }

        Ok(self.dispatcher.submit(tool, payload)?.id)
    }

    /// Full status report for one job.
    pub fn status(&self, id: JobId) -> Result<JobStatusReport> {
        let job = self.registry.get(id)?;
        let (position, wait) = self.estimator().estimate(&job);

        Ok(JobStatusReport {
            job_id: job.id,
            status: job.status,
            position,
            estimated_wait: ceil_secs(wait),
            queue_stats: self.stats(),
            added_at: job.added_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error: job.error,
        })
    }

    pub fn get_job(&self, id: JobId) -> Result<Job> {
        self.registry.get(id)
    }

    pub fn position(&self, id: JobId) -> Result<usize> {
        self.estimator().position(id)
    }

    pub fn estimated_wait(&self, id: JobId) -> Result<Duration> {
        self.estimator().estimated_wait(id)
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.snapshot(&self.registry)
    }

    /// Hand a finished job's output to the caller.
    ///
    /// The output can be taken once; later calls get [`Error::NotFound`].
    pub fn take_result(&self, id: JobId) -> Result<JobResult> {
        let job = self.registry.get(id)?;
        match job.status {
            JobStatus::Queued | JobStatus::Processing => Ok(JobResult::Pending(job.status)),
            JobStatus::Failed => Ok(JobResult::Failed(job.error.unwrap_or_default())),
            JobStatus::Completed => match self.registry.take_output(id)? {
                Some(output) => Ok(JobResult::Ready(output)),
                None => Err(Error::not_found(format!("{id} (result already taken)"))),
            },
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Evict expired terminal jobs now instead of waiting for the sweeper.
    pub fn sweep_expired(&self) -> usize {
        self.dispatcher.sweep_expired()
    }

    pub fn workers(&self) -> usize {
        self.dispatcher.workers()
    }

    /// Mean processing time recorded for `tool`, or the configured fallback.
    pub fn average_duration(&self, tool: &str) -> Duration {
        self.durations.estimate(tool)
    }

    /// Stop the pool and wait for in-flight conversions to finish.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    fn estimator(&self) -> Estimator<'_> {
        Estimator::new(&self.registry, &self.durations, self.dispatcher.workers())
    }
}
