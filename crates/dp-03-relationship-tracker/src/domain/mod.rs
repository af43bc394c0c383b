//! # Domain Module
//!
//! Relationship records and the rules that move them.

mod config;
mod record;
mod relationship;

pub use config::TrackerConfig;
pub use record::{HistoryEntry, RelationshipRecord};
pub use relationship::{PairKey, RelationshipState};
