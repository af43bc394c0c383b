//! # Relationship Tracker
//!
//! Shared store of relationship records. The map lock is held only to find
//! or insert a record; each record has its own mutex, so updates to one pair
//! are serialized while other pairs proceed.

use parking_lot::{Mutex, RwLock};
use shared_types::{now_millis, RealmId, SessionOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{PairKey, RelationshipRecord, RelationshipState, TrackerConfig};

type RecordHandle = Arc<Mutex<RelationshipRecord>>;

/// Relationship records for every pair ever contacted.
#[derive(Debug)]
pub struct RelationshipTracker {
    records: RwLock<HashMap<PairKey, RecordHandle>>,
    config: TrackerConfig,
}

impl Default for RelationshipTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl RelationshipTracker {
    /// Create an empty tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn handle(&self, key: &PairKey) -> Option<RecordHandle> {
        self.records.read().get(key).cloned()
    }

    fn handle_or_create(&self, key: PairKey) -> RecordHandle {
        if let Some(handle) = self.handle(&key) {
            return handle;
        }
        let mut records = self.records.write();
        records
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(pair = %key, "Relationship record created");
                Arc::new(Mutex::new(RelationshipRecord::new(key.clone(), now_millis())))
            })
            .clone()
    }

    /// Current record for the pair, creating a NEUTRAL one on first contact.
    pub fn get_or_create(&self, a: &RealmId, b: &RealmId) -> RelationshipRecord {
        self.handle_or_create(PairKey::new(a, b)).lock().clone()
    }

    /// Current record for the pair, if one exists.
    pub fn snapshot(&self, a: &RealmId, b: &RealmId) -> Option<RelationshipRecord> {
        self.handle(&PairKey::new(a, b)).map(|h| h.lock().clone())
    }

    /// Current state for the pair; NEUTRAL if never contacted.
    pub fn state(&self, a: &RealmId, b: &RealmId) -> RelationshipState {
        self.handle(&PairKey::new(a, b))
            .map(|h| h.lock().state())
            .unwrap_or_default()
    }

    /// Whether new sessions between `a` and `b` must be refused.
    pub fn is_blocked(&self, a: &RealmId, b: &RealmId) -> bool {
        self.state(a, b) == RelationshipState::Blocked
    }

    /// Fold a terminal session into the pair's record.
    ///
    /// Applying the same session twice is a no-op. Returns the record after
    /// the update.
    pub fn apply_outcome(&self, outcome: &SessionOutcome) -> RelationshipRecord {
        let handle = self.handle_or_create(PairKey::new(&outcome.realm_a, &outcome.realm_b));
        let mut record = handle.lock();
        let before = record.state();

        if !record.apply(outcome, &self.config) {
            debug!(session_id = %outcome.session_id, "Outcome already applied");
            return record.clone();
        }

        let after = record.state();
        if after != before {
            if after == RelationshipState::Blocked {
                warn!(
                    pair = %record.pair(),
                    trust = record.trust_score(),
                    "Relationship BLOCKED"
                );
            } else {
                info!(
                    pair = %record.pair(),
                    from = %before,
                    to = %after,
                    trust = record.trust_score(),
                    "Relationship state changed"
                );
            }
        }
        debug!(
            pair = %record.pair(),
            session_id = %outcome.session_id,
            kind = ?outcome.kind,
            trust = record.trust_score(),
            "Outcome applied"
        );
        record.clone()
    }

    /// External override; the only way out of BLOCKED. Returns the previous
    /// state.
    pub fn override_state(
        &self,
        a: &RealmId,
        b: &RealmId,
        state: RelationshipState,
    ) -> RelationshipState {
        let handle = self.handle_or_create(PairKey::new(a, b));
        let mut record = handle.lock();
        let previous = record.override_state(state, now_millis());
        info!(pair = %record.pair(), from = %previous, to = %state, "Relationship overridden");
        previous
    }

    /// Records of every pair `realm` is part of.
    pub fn relationships_of(&self, realm: &RealmId) -> Vec<RelationshipRecord> {
        let handles: Vec<RecordHandle> = self
            .records
            .read()
            .iter()
            .filter(|(key, _)| key.contains(realm))
            .map(|(_, h)| h.clone())
            .collect();
        let mut out: Vec<RelationshipRecord> = handles.iter().map(|h| h.lock().clone()).collect();
        out.sort_by(|x, y| x.pair().cmp(y.pair()));
        out
    }

    /// Number of pairs tracked.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no pair has been contacted yet.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{OutcomeKind, Topic};
    use std::thread;
    use uuid::Uuid;

    fn realm(id: &str) -> RealmId {
        RealmId::from(id)
    }

    fn outcome(a: &str, b: &str, kind: OutcomeKind) -> SessionOutcome {
        SessionOutcome {
            session_id: Uuid::new_v4(),
            realm_a: realm(a),
            realm_b: realm(b),
            topic: Topic::Trade,
            phase: kind.phase(),
            kind,
            reason: kind.default_reason().to_string(),
            rounds: 1,
            closed_at: now_millis(),
        }
    }

    #[test]
    fn test_one_record_per_unordered_pair() {
        let tracker = RelationshipTracker::default();
        tracker.get_or_create(&realm("6933"), &realm("7777"));
        tracker.get_or_create(&realm("7777"), &realm("6933"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_first_contact_is_neutral() {
        let tracker = RelationshipTracker::default();
        let record = tracker.get_or_create(&realm("6933"), &realm("7777"));
        assert_eq!(record.state(), RelationshipState::Neutral);
        assert_eq!(record.trust_score(), 0.0);
    }

    #[test]
    fn test_reads_do_not_create() {
        let tracker = RelationshipTracker::default();
        assert!(!tracker.is_blocked(&realm("1"), &realm("2")));
        assert!(tracker.snapshot(&realm("1"), &realm("2")).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_outcomes_apply_regardless_of_direction() {
        let tracker = RelationshipTracker::default();
        tracker.apply_outcome(&outcome("6933", "7777", OutcomeKind::Expired));
        tracker.apply_outcome(&outcome("7777", "6933", OutcomeKind::Expired));
        let after = tracker.apply_outcome(&outcome("6933", "7777", OutcomeKind::Expired));
        assert_eq!(after.state(), RelationshipState::Hostile);
    }

    #[test]
    fn test_block_and_override() {
        let tracker = RelationshipTracker::default();
        for _ in 0..5 {
            tracker.apply_outcome(&outcome("1", "2", OutcomeKind::TimedOut));
        }
        assert!(tracker.is_blocked(&realm("2"), &realm("1")));

        let previous =
            tracker.override_state(&realm("1"), &realm("2"), RelationshipState::Neutral);
        assert_eq!(previous, RelationshipState::Blocked);
        assert!(!tracker.is_blocked(&realm("1"), &realm("2")));
    }

    #[test]
    fn test_relationships_of() {
        let tracker = RelationshipTracker::default();
        tracker.get_or_create(&realm("1"), &realm("2"));
        tracker.get_or_create(&realm("1"), &realm("3"));
        tracker.get_or_create(&realm("2"), &realm("3"));
        assert_eq!(tracker.relationships_of(&realm("1")).len(), 2);
    }

    #[test]
    fn test_concurrent_updates_are_serialized_per_pair() {
        let tracker = Arc::new(RelationshipTracker::new(TrackerConfig {
            hostile_after: u32::MAX,
            ..TrackerConfig::default()
        }));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        tracker.apply_outcome(&outcome("a", "b", OutcomeKind::Declined));
                        tracker.apply_outcome(&outcome("c", "d", OutcomeKind::Completed));
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let ab = tracker.snapshot(&realm("a"), &realm("b")).unwrap();
        assert_eq!(ab.history().len(), 200);
        assert_eq!(ab.trust_score(), -100.0);
        let cd = tracker.snapshot(&realm("c"), &realm("d")).unwrap();
        assert_eq!(cd.history().len(), 200);
        assert_eq!(cd.trust_score(), 100.0);
    }
}
