//! # Session Events
//!
//! Inputs to the transition function.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value_objects::CounterOffer;

/// An event requested against a negotiation session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Authority and resources both passed.
    VerifyOk,
    /// Authority or resource check failed.
    VerifyFail {
        /// Gate reason, e.g. `INSUFFICIENT_AUTHORITY`.
        reason: String,
    },
    /// Counterparty accepts the terms of `round`.
    Accept {
        /// Round being accepted.
        round: u32,
    },
    /// Counterparty replaces the terms.
    Counter(CounterOffer),
    /// Counterparty explicitly declines.
    Reject {
        /// Optional decline reason.
        reason: Option<String>,
    },
    /// External execution confirmed.
    CommitOk,
    /// External execution failed.
    CommitFail {
        /// Collaborator's failure reason.
        reason: String,
    },
    /// Deadline reached.
    Expire,
    /// Operator cancellation.
    Cancel,
    /// A delegated call kept timing out past the retry bound.
    TimeoutExhausted,
    /// Unexpected failure outside the state machine.
    Abort {
        /// Cause, usually `INTERNAL`.
        reason: String,
    },
}

impl SessionEvent {
    /// Short event name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VerifyOk => "verify_ok",
            Self::VerifyFail { .. } => "verify_fail",
            Self::Accept { .. } => "accept",
            Self::Counter(_) => "counter",
            Self::Reject { .. } => "reject",
            Self::CommitOk => "commit_ok",
            Self::CommitFail { .. } => "commit_fail",
            Self::Expire => "expire",
            Self::Cancel => "cancel",
            Self::TimeoutExhausted => "timeout_exhausted",
            Self::Abort { .. } => "abort",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
