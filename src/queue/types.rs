use chrono::{DateTime, Utc};
use convertd_common::{Error, JobId, JobStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// What to convert. Handed to the executor untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Uploaded source file.
    pub input: PathBuf,
    /// Tool-specific options, exposed to command templates as `{key}`.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl JobPayload {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Handle to a finished conversion's output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub tool: String,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub output: Option<JobOutput>,
    /// Submission order; FIFO dispatch and queue position are derived from it.
    #[serde(skip)]
    pub seq: u64,
}

/// A requested lifecycle move together with the fields it sets.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Processing {
        started_at: DateTime<Utc>,
    },
    Completed {
        completed_at: DateTime<Utc>,
        output: JobOutput,
    },
    Failed {
        completed_at: DateTime<Utc>,
        error: String,
    },
}

impl StatusUpdate {
    pub fn target(&self) -> JobStatus {
        match self {
            StatusUpdate::Processing { .. } => JobStatus::Processing,
            StatusUpdate::Completed { .. } => JobStatus::Completed,
            StatusUpdate::Failed { .. } => JobStatus::Failed,
        }
    }
}

impl Job {
    pub fn new(seq: u64, tool: impl Into<String>, payload: JobPayload, added_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            tool: tool.into(),
            status: JobStatus::Queued,
            payload,
            added_at,
            started_at: None,
            completed_at: None,
            error: None,
            output: None,
            seq,
        }
    }

    /// Apply a status update, rejecting anything the state machine forbids.
    ///
    /// Timestamps are clamped so `added_at <= started_at <= completed_at`
    /// holds even if the clock steps backwards between calls.
    pub fn apply(&mut self, update: StatusUpdate) -> Result<()> {
        let next = update.target();
        if !self.status.can_transition_to(next) {
            return Err(Error::invariant(format!(
                "job {}: illegal transition {} -> {}",
                self.id, self.status, next
            )));
        }

        match update {
            StatusUpdate::Processing { started_at } => {
                self.started_at = Some(started_at.max(self.added_at));
            }
            StatusUpdate::Completed {
                completed_at,
                output,
            } => {
                self.completed_at = Some(self.clamp_completion(completed_at));
                self.output = Some(output);
            }
            StatusUpdate::Failed {
                completed_at,
                error,
            } => {
                self.completed_at = Some(self.clamp_completion(completed_at));
                self.error = Some(if error.trim().is_empty() {
                    "conversion failed".to_string()
                } else {
                    error
                });
            }
        }
        self.status = next;
        Ok(())
    }

    fn clamp_completion(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.max(self.started_at.unwrap_or(self.added_at))
    }

    /// Time spent in `processing`, once the job has finished.
    pub fn processing_time(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        (completed - started).to_std().ok()
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub active_count: usize,
    pub queued_count: usize,
    pub total_processed: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Percentage in `[0, 100]`; 100 when nothing has been processed yet.
    pub success_rate: f64,
}

/// Everything a polling client is told about one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub position: usize,
    /// Whole seconds, rounded up.
    pub estimated_wait: u64,
    pub queue_stats: QueueStats,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
