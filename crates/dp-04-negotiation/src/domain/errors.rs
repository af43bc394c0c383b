//! # Domain Errors
//!
//! Every negotiation error is a state error at the protocol level.

use shared_types::{reasons, DiplomacyError, SessionId, SessionPhase};
use thiserror::Error;

/// Negotiation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// Event not allowed from the current phase. Session untouched.
    #[error("Invalid transition: {event} in {phase}")]
    InvalidTransition {
        /// Phase at the time of the attempt.
        phase: SessionPhase,
        /// Requested event name.
        event: &'static str,
    },

    /// Message round is behind the session. Session untouched.
    #[error("Stale message: round {got} < current round {current}")]
    StaleMessage {
        /// Session's current round.
        current: u32,
        /// Round carried by the message.
        got: u32,
    },

    /// Another transition on this session is in flight. Session untouched.
    #[error("Session busy: {0}")]
    SessionBusy(SessionId),

    /// No session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session with this id already exists for a different pair or topic.
    #[error("Session id conflict: {0}")]
    IdConflict(SessionId),
}

impl NegotiationError {
    /// Machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } | Self::IdConflict(_) => reasons::INVALID_TRANSITION,
            Self::StaleMessage { .. } => reasons::STALE_MESSAGE,
            Self::SessionBusy(_) => reasons::SESSION_BUSY,
            Self::SessionNotFound(_) => reasons::SESSION_NOT_FOUND,
        }
    }
}

impl From<NegotiationError> for DiplomacyError {
    fn from(err: NegotiationError) -> Self {
        DiplomacyError::state(err.reason())
    }
}
