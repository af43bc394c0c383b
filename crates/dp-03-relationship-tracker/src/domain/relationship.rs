//! Relationship states and the unordered pair key.

use serde::{Deserialize, Serialize};
use shared_types::RealmId;
use std::fmt;

/// Bilateral relationship state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipState {
    /// No history or mixed history.
    #[default]
    Neutral,
    /// At least one accepted session.
    Friendly,
    /// An accepted alliance.
    Allied,
    /// Repeated failures.
    Hostile,
    /// No new sessions until an external override.
    Blocked,
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Neutral => "NEUTRAL",
            Self::Friendly => "FRIENDLY",
            Self::Allied => "ALLIED",
            Self::Hostile => "HOSTILE",
            Self::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Unordered realm pair. `PairKey::new(a, b) == PairKey::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: RealmId,
    high: RealmId,
}

impl PairKey {
    /// Normalize two realms into a key.
    pub fn new(a: &RealmId, b: &RealmId) -> Self {
        if a <= b {
            Self {
                low: a.clone(),
                high: b.clone(),
            }
        } else {
            Self {
                low: b.clone(),
                high: a.clone(),
            }
        }
    }

    /// Both realms, smaller id first.
    pub fn realms(&self) -> (&RealmId, &RealmId) {
        (&self.low, &self.high)
    }

    /// Whether `realm` is one side of the pair.
    pub fn contains(&self, realm: &RealmId) -> bool {
        &self.low == realm || &self.high == realm
    }

    /// The side that is not `realm`.
    pub fn other(&self, realm: &RealmId) -> Option<&RealmId> {
        if &self.low == realm {
            Some(&self.high)
        } else if &self.high == realm {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}
