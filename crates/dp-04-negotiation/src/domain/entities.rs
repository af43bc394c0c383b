//! # Domain Entities
//!
//! Negotiation session and transition records.

use serde::{Deserialize, Serialize};
use shared_types::{
    OutcomeKind, RealmId, SessionId, SessionOutcome, SessionPhase, Timestamp, Topic,
};

use super::value_objects::{CounterOffer, NegotiationConfig, Terms};

/// One proposal being driven to a terminal outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationSession {
    /// Session id, shared by both parties.
    pub id: SessionId,
    /// Initiating realm.
    pub realm_a: RealmId,
    /// Counterparty realm.
    pub realm_b: RealmId,
    /// Trade or alliance.
    pub topic: Topic,
    /// Current phase.
    pub phase: SessionPhase,
    /// Terms currently on the table.
    pub proposed_terms: Terms,
    /// Most recent counter's terms.
    pub counter_terms: Option<Terms>,
    /// Current round. The opening proposal is round 1.
    pub round: u32,
    /// Counter that set the current round's terms.
    pub last_counter: Option<CounterOffer>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Deadline.
    pub expires_at: Timestamp,
    /// Set once terminal.
    pub outcome: Option<SessionOutcome>,
}

impl NegotiationSession {
    /// New session in VERIFICATION.
    pub fn new(
        id: SessionId,
        realm_a: RealmId,
        realm_b: RealmId,
        topic: Topic,
        terms: Terms,
        now: Timestamp,
        config: &NegotiationConfig,
    ) -> Self {
        Self {
            id,
            realm_a,
            realm_b,
            topic,
            phase: SessionPhase::Verification,
            proposed_terms: terms,
            counter_terms: None,
            round: 1,
            last_counter: None,
            created_at: now,
            expires_at: now.saturating_add(config.session_ttl_ms),
            outcome: None,
        }
    }

    /// Whether the session is closed.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether `realm` is a party to this session.
    pub fn involves(&self, realm: &RealmId) -> bool {
        &self.realm_a == realm || &self.realm_b == realm
    }

    /// The party that is not `realm`.
    pub fn counterparty_of(&self, realm: &RealmId) -> Option<&RealmId> {
        if &self.realm_a == realm {
            Some(&self.realm_b)
        } else if &self.realm_b == realm {
            Some(&self.realm_a)
        } else {
            None
        }
    }

    pub(crate) fn close(&mut self, kind: OutcomeKind, reason: String, now: Timestamp) {
        self.phase = kind.phase();
        self.outcome = Some(SessionOutcome {
            session_id: self.id,
            realm_a: self.realm_a.clone(),
            realm_b: self.realm_b.clone(),
            topic: self.topic,
            phase: self.phase,
            kind,
            reason,
            rounds: self.round,
            closed_at: now,
        });
    }
}

/// Result of one transition attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Session the event was applied to.
    pub session_id: SessionId,
    /// Phase before.
    pub from: SessionPhase,
    /// Phase after.
    pub to: SessionPhase,
    /// Round after.
    pub round: u32,
    /// Whether the session changed at all.
    pub applied: bool,
    /// Present when this transition closed the session.
    pub outcome: Option<SessionOutcome>,
}

impl Transition {
    /// Whether the phase changed.
    pub fn phase_changed(&self) -> bool {
        self.from != self.to
    }

    /// Whether this transition closed the session.
    pub fn closed(&self) -> bool {
        self.outcome.is_some()
    }
}
