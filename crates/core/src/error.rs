//! Domain error model.

use thiserror::Error;

use crate::job::JobStatus;

/// Result type used across the domain layer.
pub type JobResult<T> = Result<T, JobError>;

/// Domain-level error for job records.
///
/// Keep this focused on deterministic failures (rejected transitions,
/// malformed identifiers). Gateway and pipeline concerns have their own types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// A status change that would move the job backwards or skip a state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl JobError {
    pub fn invalid_transition(from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
