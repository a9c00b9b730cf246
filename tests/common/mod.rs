//! Shared test harness for integration tests.
//!
//! Provides [`ScriptedExecutor`], an in-process executor whose per-tool
//! behaviour is set by the test, and [`TestQueue`] which wires it into a
//! [`QueueManager`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use convertd::clock::{Clock, ManualClock, SystemClock};
use convertd::config::QueueConfig;
use convertd::executor::{ExecutionError, Executor};
use convertd::queue::{JobOutput, JobPayload, QueueManager};
use convertd_common::{JobId, JobStatus};

/// How a tool behaves when [`ScriptedExecutor`] runs it.
#[derive(Clone)]
pub enum Behavior {
    Succeed(Duration),
    Fail(Duration, String),
    /// Blocks until the test releases a permit on the executor's gate.
    Gated,
    /// Sleeps far longer than any test timeout.
    Hang,
}

pub struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    timeouts: HashMap<String, Duration>,
    gate: Arc<Semaphore>,
    running: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<PathBuf>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            timeouts: HashMap::new(),
            gate: Arc::new(Semaphore::new(0)),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn tool(mut self, name: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(name.to_string(), behavior);
        self
    }

    pub fn timeout(mut self, name: &str, timeout: Duration) -> Self {
        self.timeouts.insert(name.to_string(), timeout);
        self
    }

    /// Let `n` gated jobs finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Inputs in the order the executor was asked to convert them.
    pub fn started(&self) -> Vec<PathBuf> {
        self.started.lock().clone()
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(
        &self,
        tool: &str,
        payload: &JobPayload,
        _cancel: CancellationToken,
    ) -> Result<JobOutput, ExecutionError> {
        let behavior = self
            .behaviors
            .get(tool)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownTool(tool.to_string()))?;

        self.started.lock().push(payload.input.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = match behavior {
            Behavior::Succeed(after) => {
                tokio::time::sleep(after).await;
                Ok(())
            }
            Behavior::Fail(after, message) => {
                tokio::time::sleep(after).await;
                Err(ExecutionError::Other(message))
            }
            Behavior::Gated => match self.gate.acquire().await {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(_) => Err(ExecutionError::Cancelled),
            },
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result.map(|()| JobOutput {
            path: payload.input.with_extension("out"),
            size_bytes: 42,
        })
    }

    fn timeout_for(&self, tool: &str) -> Option<Duration> {
        self.timeouts.get(tool).copied()
    }

    fn supports(&self, tool: &str) -> bool {
        self.behaviors.contains_key(tool)
    }
}

pub fn queue_config(workers: usize, max_queued: usize) -> QueueConfig {
    QueueConfig {
        workers,
        max_queued,
        retention_secs: 0,
        default_estimate_secs: 30,
        default_timeout_secs: 30,
        ..QueueConfig::default()
    }
}

pub struct TestQueue {
    pub queue: Arc<QueueManager>,
    pub executor: Arc<ScriptedExecutor>,
}

impl TestQueue {
    /// Build and start a queue on the system clock.
    pub fn start(config: QueueConfig, executor: ScriptedExecutor) -> Self {
        Self::start_with_clock(config, executor, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: QueueConfig,
        executor: ScriptedExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = Arc::new(executor);
        let queue = QueueManager::new(&config, executor.clone(), clock);
        queue.start();
        Self { queue, executor }
    }

    pub fn submit(&self, tool: &str, name: &str) -> JobId {
        self.queue
            .submit(tool, JobPayload::new(format!("/uploads/{name}")))
            .expect("submit failed")
    }

    pub fn status_of(&self, id: JobId) -> JobStatus {
        self.queue.get_job(id).expect("job missing").status
    }

    /// Poll until `id` reaches `status`.
    pub async fn wait_for_status(&self, id: JobId, status: JobStatus) {
        wait_until(|| self.status_of(id) == status).await;
    }

    /// Poll until `n` jobs are processing.
    pub async fn wait_for_active(&self, n: usize) {
        wait_until(|| self.queue.stats().active_count == n).await;
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::default())
}

/// Poll `condition` every few milliseconds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
