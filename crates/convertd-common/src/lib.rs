//! Convertd-Common: shared identifiers, status types and errors.
//!
//! This crate provides the vocabulary shared between the queue core and the
//! HTTP layer:
//!
//! - **Typed IDs**: [`JobId`], a UUID newtype that cannot be confused with
//!   other identifiers
//! - **Job status**: the four lifecycle states a conversion job moves through
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use convertd_common::{Error, JobId, JobStatus, Result};
//!
//! let id = JobId::new();
//! assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
//!
//! fn lookup(id: JobId) -> Result<()> {
//!     Err(Error::not_found(id))
//! }
//! assert!(lookup(id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
