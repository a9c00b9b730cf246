//! Job lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a conversion job.
///
/// The only legal moves are `queued -> processing` followed by either
/// `processing -> completed` or `processing -> failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the FIFO for a free worker.
    Queued,
    /// Claimed by a worker; the external tool is running.
    Processing,
    /// Finished successfully; output is available.
    Completed,
    /// Finished with an executor error or timeout.
    Failed,
}

impl JobStatus {
    /// Returns true for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
