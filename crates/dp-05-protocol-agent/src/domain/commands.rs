//! # Session Commands
//!
//! Local decisions an operator or reasoning layer takes on a session.

use dp_04_negotiation::Terms;
use serde::{Deserialize, Serialize};

/// What the local realm decides to do with a session in NEGOTIATION.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Accept the current round's terms.
    Accept,
    /// Replace the terms and open the next round.
    Counter {
        /// Replacement terms, initiator's side.
        terms: Terms,
    },
    /// Decline.
    Reject {
        /// Optional reason sent to the counterparty.
        reason: Option<String>,
    },
}

impl SessionCommand {
    /// Command name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Counter { .. } => "counter",
            Self::Reject { .. } => "reject",
        }
    }
}
