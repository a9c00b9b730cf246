//! Common error types used throughout convertd.
//!
//! Every failure the queue can report to a caller funnels into [`Error`],
//! which carries enough context for the HTTP layer to pick a status code via
//! [`Error::http_status`].

use std::fmt;

/// Common error type for convertd.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No job is registered under the given id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Admission rejected: the FIFO already holds the configured maximum.
    #[error("Queue is full ({capacity} jobs waiting)")]
    QueueFull {
        /// Configured maximum number of queued jobs.
        capacity: usize,
    },

    /// An illegal job state transition was attempted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::QueueFull { .. } => 503,
            Error::InvariantViolation(_) => 500,
            Error::InvalidInput(_) => 400,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::QueueFull { .. } => "queue_full",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Create a new NotFound error.
    pub fn not_found(id: impl fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Create a new InvariantViolation error.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
