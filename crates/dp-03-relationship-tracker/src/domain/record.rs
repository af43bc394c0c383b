//! Relationship record and outcome rules.

use serde::{Deserialize, Serialize};
use shared_types::{OutcomeKind, SessionId, SessionOutcome, SessionPhase, Timestamp, Topic};

use super::config::TrackerConfig;
use super::relationship::{PairKey, RelationshipState};

/// One closed session as remembered by the pair's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Session that closed.
    pub session_id: SessionId,
    /// What was negotiated.
    pub topic: Topic,
    /// Terminal phase.
    pub phase: SessionPhase,
    /// Cause of termination.
    pub kind: OutcomeKind,
    /// Reason string.
    pub reason: String,
    /// Trust change applied for this entry.
    pub trust_delta: f64,
    /// State after the entry was applied.
    pub state_after: RelationshipState,
    /// When the session closed.
    pub closed_at: Timestamp,
}

/// Trust and state between two realms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pair: PairKey,
    state: RelationshipState,
    trust_score: f64,
    consecutive_failures: u32,
    hostile_failures: u32,
    history: Vec<HistoryEntry>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl RelationshipRecord {
    /// First-contact record: NEUTRAL, trust 0.
    pub fn new(pair: PairKey, now: Timestamp) -> Self {
        Self {
            pair,
            state: RelationshipState::Neutral,
            trust_score: 0.0,
            consecutive_failures: 0,
            hostile_failures: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The pair this record describes.
    pub fn pair(&self) -> &PairKey {
        &self.pair
    }

    /// Current state.
    pub fn state(&self) -> RelationshipState {
        self.state
    }

    /// Current trust score.
    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }

    /// Counted failures since the last accepted session.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Closed sessions, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// When the record was created.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// When the record last changed.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Whether new sessions for this pair must be refused.
    pub fn is_blocked(&self) -> bool {
        self.state == RelationshipState::Blocked
    }

    /// Whether `session_id` has already been applied.
    pub fn has_applied(&self, session_id: &SessionId) -> bool {
        self.history.iter().any(|h| &h.session_id == session_id)
    }

    /// Apply a terminal session. Returns `false` if it was already applied.
    ///
    /// | Outcome | Trust | Streak |
    /// |---------|-------|--------|
    /// | completed | `+accept_delta` | reset |
    /// | declined | `-decline_penalty` | +1 |
    /// | exhausted, expired, timed out, execution/internal failure | `-failure_penalty` | +1 |
    /// | verification failure, cancelled | unchanged | unchanged |
    pub fn apply(&mut self, outcome: &SessionOutcome, config: &TrackerConfig) -> bool {
        if self.has_applied(&outcome.session_id) {
            return false;
        }

        let before = self.trust_score;
        match outcome.kind {
            OutcomeKind::Completed => self.on_accepted(outcome.topic, config),
            OutcomeKind::Declined => self.on_counted_failure(config.decline_penalty, config),
            OutcomeKind::Exhausted
            | OutcomeKind::Expired
            | OutcomeKind::ExecutionFailed
            | OutcomeKind::TimedOut
            | OutcomeKind::Internal => self.on_counted_failure(config.failure_penalty, config),
            OutcomeKind::VerificationFailed | OutcomeKind::Cancelled => {}
        }

        self.history.push(HistoryEntry {
            session_id: outcome.session_id,
            topic: outcome.topic,
            phase: outcome.phase,
            kind: outcome.kind,
            reason: outcome.reason.clone(),
            trust_delta: self.trust_score - before,
            state_after: self.state,
            closed_at: outcome.closed_at,
        });
        self.updated_at = self.updated_at.max(outcome.closed_at);
        true
    }

    /// Force a state. Clears the failure streaks.
    pub fn override_state(&mut self, state: RelationshipState, now: Timestamp) -> RelationshipState {
        let previous = self.state;
        self.state = state;
        self.consecutive_failures = 0;
        self.hostile_failures = 0;
        self.updated_at = now;
        previous
    }

    fn on_accepted(&mut self, topic: Topic, config: &TrackerConfig) {
        self.trust_score = config.clamp_trust(self.trust_score + config.accept_delta);
        self.consecutive_failures = 0;
        self.hostile_failures = 0;
        self.state = match (self.state, topic) {
            (RelationshipState::Blocked, _) => RelationshipState::Blocked,
            (RelationshipState::Hostile, _) if self.trust_score > 0.0 => RelationshipState::Neutral,
            (RelationshipState::Hostile, _) => RelationshipState::Hostile,
            (_, Topic::Alliance) => RelationshipState::Allied,
            (RelationshipState::Allied, Topic::Trade) => RelationshipState::Allied,
            (_, Topic::Trade) => RelationshipState::Friendly,
        };
    }

    fn on_counted_failure(&mut self, penalty: f64, config: &TrackerConfig) {
        self.trust_score = config.clamp_trust(self.trust_score - penalty);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match self.state {
            RelationshipState::Blocked => {}
            RelationshipState::Hostile => {
                self.hostile_failures = self.hostile_failures.saturating_add(1);
                if self.hostile_failures >= config.hostile_block_threshold {
                    self.state = RelationshipState::Blocked;
                }
            }
            _ if self.consecutive_failures >= config.hostile_after => {
                self.state = RelationshipState::Hostile;
                self.hostile_failures = 0;
            }
            _ => {}
        }
    }
}
