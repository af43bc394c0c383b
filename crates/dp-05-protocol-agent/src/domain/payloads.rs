//! # Message Payloads
//!
//! Typed views of the envelope payloads the agent reads and writes. Fields
//! not listed here are carried through untouched.
//!
//! | Type | Payload |
//! |------|---------|
//! | `GREETING` | [`GreetingPayload`] |
//! | `GREETING_RESPONSE` | [`GreetingResponsePayload`] |
//! | `TRADE_PROPOSAL`, `ALLIANCE_REQUEST`, `COUNTER_PROPOSAL` | [`TermsPayload`] |
//! | `ACKNOWLEDGMENT`, `VERIFICATION` replies | [`AckPayload`] |
//! | `REJECTION` | [`RejectionPayload`] |
//!
//! Terms are always written from the initiating realm's side: `offer` is
//! what the initiator gives, whoever sends the counter.

use dp_03_relationship_tracker::RelationshipState;
use dp_04_negotiation::Terms;
use serde::{Deserialize, Serialize};
use shared_types::{AuthorityLevel, SessionId};

/// `acknowledges` values.
pub mod acks {
    /// Greeting received.
    pub const RECEIVED: &str = "RECEIVED";
    /// Proposer passed the gate.
    pub const VERIFIED: &str = "VERIFIED";
    /// Sender accepts the current round's terms.
    pub const ACCEPTED: &str = "ACCEPTED";
    /// Terms committed externally.
    pub const COMMITTED: &str = "COMMITTED";
    /// Answer to a standalone `VERIFICATION` request.
    pub const VERIFICATION: &str = "VERIFICATION";
}

/// Greeting intent.
pub const ESTABLISH_COMMUNICATION: &str = "ESTABLISH_COMMUNICATION";

/// Next step announced in a greeting response.
pub const AWAITING_VERIFICATION: &str = "AWAITING_VERIFICATION";

fn first_round() -> u32 {
    1
}

/// `GREETING` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GreetingPayload {
    /// Why the sender reaches out.
    pub intent: String,
    /// Sender's authority.
    pub authority_level: AuthorityLevel,
    /// Whether the sender expects a verification exchange.
    pub verification_required: bool,
    /// Free text from the reasoning engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GREETING_RESPONSE` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GreetingResponsePayload {
    /// Always `RECEIVED`.
    pub acknowledgment: String,
    /// Responder's authority.
    pub authority_level: AuthorityLevel,
    /// Relationship as the responder sees it.
    pub relationship_state: RelationshipState,
    /// Next expected step.
    pub next_action: String,
    /// Free text from the reasoning engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Session-bound terms: proposals and counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermsPayload {
    /// Shared session id.
    pub session_id: SessionId,
    /// Round these terms belong to. Proposals are round 1.
    #[serde(default = "first_round")]
    pub round: u32,
    /// Offer and request.
    #[serde(flatten)]
    pub terms: Terms,
}

/// `ACKNOWLEDGMENT` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    /// What is acknowledged, one of [`acks`].
    pub acknowledges: String,
    /// Session, when the acknowledgment is session-bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Round accepted, for `ACCEPTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// Sender's authority, for `VERIFIED` and `VERIFICATION`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_level: Option<AuthorityLevel>,
    /// Commit reference, for `COMMITTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl AckPayload {
    /// Session-bound acknowledgment.
    pub fn session(acknowledges: &str, session_id: SessionId) -> Self {
        Self {
            acknowledges: acknowledges.to_string(),
            session_id: Some(session_id),
            round: None,
            authority_level: None,
            transaction_hash: None,
        }
    }
}

/// `REJECTION` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectionPayload {
    /// Machine-readable reason.
    pub reason: String,
    /// Session being rejected, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}
