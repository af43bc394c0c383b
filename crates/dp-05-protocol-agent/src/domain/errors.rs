//! # Domain Errors
//!
//! Failures of the delegated collaborators and how they surface.

use shared_types::{reasons, DiplomacyError};
use std::fmt;
use thiserror::Error;

/// Reasoning collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThinkError {
    /// Engine not reachable.
    #[error("Reasoning engine unavailable: {0}")]
    Unavailable(String),

    /// Engine answered with an error.
    #[error("Reasoning failed: {0}")]
    Failed(String),
}

/// Execution collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The commit was attempted and reverted.
    #[error("Execution reverted: {0}")]
    Reverted(String),

    /// The request was refused before submission.
    #[error("Execution rejected: {0}")]
    Rejected(String),

    /// Collaborator not reachable.
    #[error("Execution collaborator unavailable: {0}")]
    Unavailable(String),
}

impl ExecutionError {
    /// Reason carried in the `COMMIT_FAILED` outcome.
    pub fn reason(&self) -> String {
        match self {
            Self::Reverted(r) | Self::Rejected(r) | Self::Unavailable(r) => r.clone(),
        }
    }
}

impl From<ExecutionError> for DiplomacyError {
    fn from(err: ExecutionError) -> Self {
        DiplomacyError::Execution(err.reason())
    }
}

/// Outcome of a delegated call wrapped in timeout and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateError<E> {
    /// Every attempt hit the deadline.
    TimedOut {
        /// Delegated operation.
        call: &'static str,
        /// Attempts made.
        attempts: u32,
    },
    /// The collaborator answered with an error. Not retried.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for DelegateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { call, attempts } => {
                write!(f, "{call} timed out after {attempts} attempts")
            }
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for DelegateError<E> {}

impl<E> DelegateError<E> {
    /// Whether the retry bound was exhausted.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Timeout as a protocol error.
    pub fn timeout_error() -> DiplomacyError {
        DiplomacyError::Timeout(reasons::TIMEOUT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_maps_to_execution() {
        let err: DiplomacyError = ExecutionError::Reverted("INSUFFICIENT_BALANCE".into()).into();
        assert_eq!(err, DiplomacyError::Execution("INSUFFICIENT_BALANCE".into()));
    }

    #[test]
    fn test_delegate_display() {
        let err: DelegateError<ThinkError> = DelegateError::TimedOut {
            call: "think",
            attempts: 4,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "think timed out after 4 attempts");
    }
}
