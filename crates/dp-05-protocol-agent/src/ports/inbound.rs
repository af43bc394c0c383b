//! # Inbound Ports
//!
//! API trait defining what a protocol agent can do.
//!
//! Every method that returns envelopes leaves delivery to the caller: the
//! agent never talks to the wire itself.

use async_trait::async_trait;
use dp_01_envelope_codec::{MessageEnvelope, MessageType};
use dp_03_relationship_tracker::RelationshipRecord;
use dp_04_negotiation::NegotiationSession;
use serde_json::{Map, Value};
use shared_types::{DiplomacyResult, RealmId, SessionId};

use crate::domain::SessionCommand;

/// Result of [`DiplomacyApi::initiate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Initiated {
    /// Envelope to send. `None` when the proposal joined a live session.
    pub envelope: Option<MessageEnvelope>,
    /// Session opened or joined, for proposals.
    pub session_id: Option<SessionId>,
}

/// Protocol agent API - inbound port.
#[async_trait]
pub trait DiplomacyApi: Send + Sync {
    /// Start an exchange with `target`. Only initiating message types are
    /// accepted.
    async fn initiate(
        &self,
        target: &RealmId,
        message_type: MessageType,
        payload: Map<String, Value>,
    ) -> DiplomacyResult<Initiated>;

    /// Process one envelope addressed to this agent. Returns the replies.
    async fn handle_incoming(&self, envelope: MessageEnvelope)
        -> DiplomacyResult<Vec<MessageEnvelope>>;

    /// Apply a local decision to a session. Returns the envelope announcing
    /// it to the counterparty.
    async fn advance_session(
        &self,
        session_id: SessionId,
        command: SessionCommand,
    ) -> DiplomacyResult<Option<MessageEnvelope>>;

    /// Cancel a session. Returns the notice for the counterparty, or `None`
    /// if the session was already closed.
    async fn cancel_session(&self, session_id: SessionId)
        -> DiplomacyResult<Option<MessageEnvelope>>;

    /// Snapshot of a session.
    fn session(&self, session_id: SessionId) -> Option<NegotiationSession>;

    /// Relationship between this agent's realm and `realm`.
    fn relationship_with(&self, realm: &RealmId) -> RelationshipRecord;
}
