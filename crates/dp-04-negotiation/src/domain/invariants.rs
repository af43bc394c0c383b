//! # Domain Invariants
//!
//! Business rules for negotiation sessions.

use shared_types::SessionPhase;
use std::cmp::Ordering;

use super::value_objects::CounterOffer;

/// Invariant: phase only moves along the transition table.
///
/// `NEGOTIATION -> NEGOTIATION` (a counter) is the only self-transition.
pub fn invariant_phase_forward(from: SessionPhase, to: SessionPhase) -> bool {
    use SessionPhase::*;
    matches!(
        (from, to),
        (Verification, Negotiation)
            | (Verification, Rejected)
            | (Verification, Failed)
            | (Negotiation, Negotiation)
            | (Negotiation, Execution)
            | (Negotiation, Rejected)
            | (Negotiation, Failed)
            | (Execution, Accepted)
            | (Execution, Failed)
    )
}

/// Order two counters for the same round; `Greater` means `a` wins.
///
/// Later timestamp wins. On equal timestamps the lexicographically smaller
/// realm wins. Identical sender and timestamp fall back to the smaller
/// serialized terms so the result never depends on arrival order.
pub fn compare_counters(a: &CounterOffer, b: &CounterOffer) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| b.from.cmp(&a.from))
        .then_with(|| {
            let ta = serde_json::to_string(&a.terms).unwrap_or_default();
            let tb = serde_json::to_string(&b.terms).unwrap_or_default();
            tb.cmp(&ta)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Terms;
    use proptest::prelude::*;
    use shared_types::{RealmId, ResourceAmount};

    fn resolve_tie<'a>(a: &'a CounterOffer, b: &'a CounterOffer) -> &'a CounterOffer {
        match compare_counters(a, b) {
            Ordering::Less => b,
            _ => a,
        }
    }

    fn counter(from: &str, timestamp: u64, amount: u64) -> CounterOffer {
        CounterOffer {
            from: RealmId::from(from),
            round: 2,
            timestamp,
            terms: Terms::new(vec![ResourceAmount::new(3, amount)], vec![]),
        }
    }

    #[test]
    fn test_phase_never_regresses() {
        assert!(invariant_phase_forward(
            SessionPhase::Verification,
            SessionPhase::Negotiation
        ));
        assert!(!invariant_phase_forward(
            SessionPhase::Negotiation,
            SessionPhase::Verification
        ));
        assert!(!invariant_phase_forward(
            SessionPhase::Accepted,
            SessionPhase::Failed
        ));
        assert!(!invariant_phase_forward(
            SessionPhase::Verification,
            SessionPhase::Execution
        ));
    }

    #[test]
    fn test_later_timestamp_wins() {
        let early = counter("1111", 100, 1);
        let late = counter("9999", 200, 2);
        assert_eq!(resolve_tie(&early, &late), &late);
        assert_eq!(resolve_tie(&late, &early), &late);
    }

    #[test]
    fn test_smaller_realm_wins_on_equal_timestamps() {
        let a = counter("6933", 100, 1);
        let b = counter("7777", 100, 2);
        assert_eq!(resolve_tie(&a, &b), &a);
        assert_eq!(resolve_tie(&b, &a), &a);
    }

    proptest! {
        #[test]
        fn prop_tie_break_is_order_independent(
            ta in 0u64..5, tb in 0u64..5,
            ra in "[0-9]{1,3}", rb in "[0-9]{1,3}",
            aa in 0u64..3, ab in 0u64..3,
        ) {
            let a = counter(&ra, ta, aa);
            let b = counter(&rb, tb, ab);
            let first = resolve_tie(&a, &b).clone();
            let second = resolve_tie(&b, &a).clone();
            prop_assert_eq!(&first, &second);

            if ta != tb {
                prop_assert_eq!(first.timestamp, ta.max(tb));
            } else if ra != rb {
                prop_assert_eq!(first.from, RealmId::from(ra.min(rb)));
            }
        }
    }
}
