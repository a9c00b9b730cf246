//! Fixed-size worker pool over a single FIFO.
//!
//! `workers` tasks pull job ids from one queue in submission order, so at
//! most `workers` jobs are ever `processing`. Each job's outcome is written
//! back to the registry, the duration tracker and the outcome counters in one
//! registry write before the worker takes the next id.

use super::durations::DurationTracker;
use super::events::{EventBus, QueueEvent};
use super::registry::JobRegistry;
use super::stats::StatsAggregator;
use super::types::{Job, JobOutput, JobPayload, StatusUpdate};
use crate::config::QueueConfig;
use crate::executor::Executor;
use convertd_common::{Error, JobId, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Dispatcher {
    config: QueueConfig,
    registry: Arc<JobRegistry>,
    durations: Arc<DurationTracker>,
    stats: Arc<StatsAggregator>,
    events: EventBus,
    executor: Arc<dyn Executor>,
    queue: Mutex<VecDeque<JobId>>,
    notify: Notify,
    cancel: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        config: QueueConfig,
        registry: Arc<JobRegistry>,
        durations: Arc<DurationTracker>,
        stats: Arc<StatsAggregator>,
        events: EventBus,
        executor: Arc<dyn Executor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            durations,
            stats,
            events,
            executor,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Admit a job, or refuse it when the queue is full.
    ///
    /// The capacity check, the registry insert and the enqueue happen under
    /// the queue lock, so a refused submission leaves no record behind and
    /// two concurrent submissions can never both take the last slot.
    pub fn submit(&self, tool: &str, payload: JobPayload) -> Result<Job> {
        if self.cancel.is_cancelled() {
            return Err(Error::internal("queue is shutting down"));
        }

        let job = {
            let mut queue = self.queue.lock();
            if queue.len() >= self.config.max_queued {
                return Err(Error::QueueFull {
                    capacity: self.config.max_queued,
                });
            }
            let job = self.registry.create(tool, payload);
            queue.push_back(job.id);
            // Published under the lock so no worker can report the start first.
            self.events.publish(QueueEvent::JobQueued {
                job_id: job.id,
                tool: job.tool.clone(),
            });
            job
        };
        self.notify.notify_one();

        tracing::info!(job_id = %job.id, tool = %job.tool, "Job queued");
        Ok(job)
    }

    /// Spawn the workers and, when retention is enabled, the sweeper.
    ///
    /// Calling this more than once is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.tasks.lock();
        for worker in 0..self.workers() {
            let dispatcher = Arc::clone(self);
            tasks.push(tokio::spawn(dispatcher.run_worker(worker)));
        }

        if let Some(retention) = self.config.retention() {
            let dispatcher = Arc::clone(self);
            tasks.push(tokio::spawn(dispatcher.run_sweeper(retention)));
        }

        tracing::info!(
            workers = self.workers(),
            max_queued = self.config.max_queued,
            "Dispatcher started"
        );
    }

    /// Stop taking new work and wait for every task to exit.
    ///
    /// Busy workers finish (or time out) their current job first. Jobs still
    /// in the FIFO stay `queued`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!("Queue task ended abnormally: {e}");
            }
        }

        tracing::info!(left_queued = self.pending(), "Dispatcher stopped");
    }

    /// Drop terminal jobs older than the retention window. Returns how many
    /// were evicted.
    pub fn sweep_expired(&self) -> usize {
        let Some(retention) = self.config.retention() else {
            return 0;
        };
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };

        let cutoff = self.registry.clock().now() - retention;
        let evicted = self.registry.evict_terminal_before(cutoff);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired jobs");
        }
        evicted
    }

    async fn run_worker(self: Arc<Self>, worker: usize) {
        tracing::debug!(worker, "Worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let next = self.queue.lock().pop_front();
            if let Some(job_id) = next {
                self.run_job(worker, job_id).await;
                continue;
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        tracing::debug!(worker, "Worker stopped");
    }

    async fn run_sweeper(self: Arc<Self>, retention: Duration) {
        tracing::debug!(?retention, "Retention sweeper started");
        let mut interval = tokio::time::interval(self.config.sweep_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_expired();
                }
                _ = self.cancel.cancelled() => break,
            }
        }
    }

    async fn run_job(&self, worker: usize, job_id: JobId) {
        let clock = self.registry.clock();
        let job = match self.registry.update_status(
            job_id,
            StatusUpdate::Processing {
                started_at: clock.now(),
            },
        ) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job_id, worker, "Cannot start job: {e}");
                return;
            }
        };

        tracing::info!(job_id = %job.id, tool = %job.tool, worker, "Processing job");
        self.events.publish(QueueEvent::JobStarted {
            job_id: job.id,
            tool: job.tool.clone(),
        });

        let timeout = self
            .executor
            .timeout_for(&job.tool)
            .unwrap_or_else(|| self.config.default_timeout());
        // Not a child of the pool token: shutdown lets running jobs finish.
        let cancel = CancellationToken::new();

        let execution = AssertUnwindSafe(self.executor.execute(
            &job.tool,
            &job.payload,
            cancel.clone(),
        ))
        .catch_unwind();

        let outcome = match tokio::time::timeout(timeout, execution).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_panic)) => Err("executor panicked".to_string()),
            Err(_elapsed) => {
                cancel.cancel();
                Err(format!("timed out after {timeout:?}"))
            }
        };

        match outcome {
            Ok(output) => self.complete(&job, output),
            Err(message) => self.fail(&job, message),
        }
    }

    /// Outcome counters and the duration history are updated while the
    /// registry write lock is held, so no status read sees a terminal job
    /// with stale counters.
    fn complete(&self, job: &Job, output: JobOutput) {
        let update = StatusUpdate::Completed {
            completed_at: self.registry.clock().now(),
            output,
        };
        let completed = match self.registry.update_status_then(job.id, update, |done| {
            if let Some(taken) = done.processing_time() {
                self.durations.record(&done.tool, taken);
            }
            self.stats.record_success();
        }) {
            Ok(completed) => completed,
            Err(e) => {
                tracing::error!(job_id = %job.id, "Cannot complete job: {e}");
                return;
            }
        };

        let elapsed = completed.processing_time().unwrap_or_default();
        tracing::info!(
            job_id = %job.id,
            tool = %job.tool,
            duration_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
        self.events.publish(QueueEvent::JobCompleted {
            job_id: job.id,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    fn fail(&self, job: &Job, error: String) {
        let update = StatusUpdate::Failed {
            completed_at: self.registry.clock().now(),
            error,
        };
        let failed = match self
            .registry
            .update_status_then(job.id, update, |_| self.stats.record_failure())
        {
            Ok(failed) => failed,
            Err(e) => {
                tracing::error!(job_id = %job.id, "Cannot fail job: {e}");
                return;
            }
        };

        let elapsed = failed.processing_time().unwrap_or_default();
        let error = failed.error.unwrap_or_default();
        tracing::warn!(
            job_id = %job.id,
            tool = %job.tool,
            duration_ms = elapsed.as_millis() as u64,
            "Job failed: {error}"
        );
        self.events.publish(QueueEvent::JobFailed {
            job_id: job.id,
            error,
        });
    }
}
