//! # Error Types
//!
//! The protocol-wide error taxonomy. Subsystem-local error enums convert
//! into [`DiplomacyError`] at their crate boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reasons carried by [`DiplomacyError`] variants.
pub mod reasons {
    /// Granted authority below the level the action requires.
    pub const INSUFFICIENT_AUTHORITY: &str = "INSUFFICIENT_AUTHORITY";
    /// Balances do not cover the requested resources.
    pub const RESOURCES_UNAVAILABLE: &str = "RESOURCES_UNAVAILABLE";
    /// Open order missing, expired, not takeable by the proposer, or priced
    /// differently from the proposal.
    pub const ORDER_UNAVAILABLE: &str = "ORDER_UNAVAILABLE";
    /// The pair's relationship is BLOCKED.
    pub const RELATIONSHIP_BLOCKED: &str = "RELATIONSHIP_BLOCKED";
    /// Another transition on the same session is in flight.
    pub const SESSION_BUSY: &str = "SESSION_BUSY";
    /// Message round is behind the session's current round.
    pub const STALE_MESSAGE: &str = "STALE_MESSAGE";
    /// Event not allowed from the session's current phase.
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
    /// No session with the given id.
    pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
    /// Round counter exceeded the configured maximum.
    pub const NEGOTIATION_EXHAUSTED: &str = "NEGOTIATION_EXHAUSTED";
    /// Operator cancelled the session.
    pub const CANCELLED: &str = "CANCELLED";
    /// Session passed its deadline.
    pub const EXPIRED: &str = "EXPIRED";
    /// A delegated call kept timing out past the retry bound.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// Counterparty explicitly declined.
    pub const DECLINED: &str = "DECLINED";
    /// Unexpected failure caught at the agent boundary.
    pub const INTERNAL: &str = "INTERNAL";
}

/// Broad error category, used for event payloads and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or unparsable envelope.
    Format,
    /// Authority or resources insufficient.
    Verification,
    /// Invalid transition, stale message, blocked pair, busy session.
    State,
    /// Collaborator unresponsive.
    Timeout,
    /// External commit failed.
    Execution,
    /// Anything else.
    Internal,
}

/// Errors surfaced by the diplomatic protocol core.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DiplomacyError {
    /// Malformed envelope; rejected before reaching the state machine.
    #[error("Format error: {0}")]
    Format(String),

    /// Authority or resource check failed.
    #[error("Verification error: {0}")]
    Verification(String),

    /// State machine rejected the request.
    #[error("State error: {0}")]
    State(String),

    /// Delegated call did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// External execution collaborator reported failure.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DiplomacyError {
    /// Shorthand for a state error with one of the [`reasons`] constants.
    pub fn state(reason: &str) -> Self {
        Self::State(reason.to_string())
    }

    /// Shorthand for a verification error.
    pub fn verification(reason: &str) -> Self {
        Self::Verification(reason.to_string())
    }

    /// Reason string carried by the error.
    pub fn reason(&self) -> &str {
        match self {
            Self::Format(r)
            | Self::Verification(r)
            | Self::State(r)
            | Self::Timeout(r)
            | Self::Execution(r)
            | Self::Internal(r) => r,
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Verification(_) => ErrorKind::Verification,
            Self::State(_) => ErrorKind::State,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Transient errors leave session state untouched and may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::State(r) => r == reasons::SESSION_BUSY,
            _ => false,
        }
    }
}

/// Result alias used across the workspace.
pub type DiplomacyResult<T> = Result<T, DiplomacyError>;
