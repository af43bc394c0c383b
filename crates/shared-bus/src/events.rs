//! # Diplomacy Events
//!
//! Defines the lifecycle events that flow through the shared bus. Every
//! event carries a fixed payload shape so observers never parse free text.

use serde::{Deserialize, Serialize};
use shared_types::{
    AuthorityLevel, DiplomacyError, RealmId, SessionId, SessionOutcome, SessionPhase, Topic,
};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiplomacyEvent {
    // =========================================================================
    // SESSION LIFECYCLE
    // =========================================================================
    /// A negotiation session was opened.
    /// Wire name: `session:created`
    SessionCreated {
        /// Agent that owns the session.
        realm: RealmId,
        /// Session id.
        session_id: SessionId,
        /// Realm that proposed.
        initiator: RealmId,
        /// Realm that received the proposal.
        counterparty: RealmId,
        /// What is negotiated.
        topic: Topic,
    },

    /// A session moved to a new phase.
    /// Wire name: `session:phase_changed`
    SessionPhaseChanged {
        /// Agent that owns the session.
        realm: RealmId,
        /// Session id.
        session_id: SessionId,
        /// Phase before the transition.
        from: SessionPhase,
        /// Phase after the transition.
        to: SessionPhase,
        /// Counter-proposal round after the transition.
        round: u32,
    },

    /// A session reached a terminal phase.
    /// Wire name: `session:closed`
    SessionClosed {
        /// Agent that owns the session.
        realm: RealmId,
        /// Terminal summary.
        outcome: SessionOutcome,
    },

    // =========================================================================
    // VERIFICATION
    // =========================================================================
    /// Result of the authority/resource gate.
    /// Wire name: `verification:result`
    VerificationResult {
        /// Agent that ran the gate.
        realm: RealmId,
        /// Session being verified.
        session_id: SessionId,
        /// Realm whose authority was checked.
        subject: RealmId,
        /// Whether both checks passed.
        granted: bool,
        /// Level the proposal required.
        required_level: AuthorityLevel,
        /// Level the fact source reported, if the query succeeded.
        granted_level: Option<AuthorityLevel>,
        /// Failure reason when `granted` is false.
        reason: Option<String>,
    },

    // =========================================================================
    // ERRORS
    // =========================================================================
    /// Any error surfaced at the agent boundary.
    /// Wire name: `error`
    Error {
        /// Agent that hit the error.
        realm: RealmId,
        /// Affected session, if any.
        session_id: Option<SessionId>,
        /// The original cause.
        error: DiplomacyError,
    },
}

impl DiplomacyEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::SessionCreated { .. }
            | Self::SessionPhaseChanged { .. }
            | Self::SessionClosed { .. } => EventTopic::Session,
            Self::VerificationResult { .. } => EventTopic::Verification,
            Self::Error { .. } => EventTopic::Error,
        }
    }

    /// Stable event name, e.g. `session:phase_changed`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session:created",
            Self::SessionPhaseChanged { .. } => "session:phase_changed",
            Self::SessionClosed { .. } => "session:closed",
            Self::VerificationResult { .. } => "verification:result",
            Self::Error { .. } => "error",
        }
    }

    /// Realm whose agent emitted the event.
    #[must_use]
    pub fn source_realm(&self) -> &RealmId {
        match self {
            Self::SessionCreated { realm, .. }
            | Self::SessionPhaseChanged { realm, .. }
            | Self::SessionClosed { realm, .. }
            | Self::VerificationResult { realm, .. }
            | Self::Error { realm, .. } => realm,
        }
    }

    /// Session the event refers to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::SessionPhaseChanged { session_id, .. }
            | Self::VerificationResult { session_id, .. } => Some(*session_id),
            Self::SessionClosed { outcome, .. } => Some(outcome.session_id),
            Self::Error { session_id, .. } => *session_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Session created / phase changed / closed.
    Session,
    /// Verification gate results.
    Verification,
    /// Errors at the agent boundary.
    Error,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Emitting realms to include. Empty means all realms.
    pub realms: Vec<RealmId>,
    /// Restrict to a single session.
    pub session_id: Option<SessionId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            ..Self::default()
        }
    }

    /// Create a filter for events emitted by specific realms.
    #[must_use]
    pub fn from_realms(realms: Vec<RealmId>) -> Self {
        Self {
            realms,
            ..Self::default()
        }
    }

    /// Create a filter for a single session.
    #[must_use]
    pub fn session(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &DiplomacyEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let realm_match = self.realms.is_empty() || self.realms.contains(event.source_realm());

        let session_match = match self.session_id {
            None => true,
            Some(id) => event.session_id() == Some(id),
        };

        topic_match && realm_match && session_match
    }
}
