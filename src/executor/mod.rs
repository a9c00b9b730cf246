//! Conversion backends.
//!
//! The queue only knows the [`Executor`] trait. [`CommandExecutor`] is the
//! production implementation that shells out to configured programs; tests
//! plug in their own.

mod command;
mod template;

pub use command::CommandExecutor;
pub use template::TemplateContext;

use crate::queue::{JobOutput, JobPayload};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a conversion did not produce an output.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool}: failed to spawn: {message}")]
    Spawn { tool: String, message: String },

    #[error("{tool}: {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool}: no output written to {path}")]
    MissingOutput { tool: String, path: String },

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Other(err.to_string())
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one conversion to completion.
    ///
    /// `cancel` fires when the queue gives up on the job (timeout or
    /// shutdown); implementations should stop work and return promptly.
    async fn execute(
        &self,
        tool: &str,
        payload: &JobPayload,
        cancel: CancellationToken,
    ) -> Result<JobOutput, ExecutionError>;

    /// Per-tool timeout override. `None` uses the queue default.
    fn timeout_for(&self, _tool: &str) -> Option<Duration> {
        None
    }

    /// Whether `tool` can be submitted at all.
    fn supports(&self, _tool: &str) -> bool {
        true
    }
}
