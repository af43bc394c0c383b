//! # DP-03 Relationship Tracker
//!
//! Bilateral relationship state and trust history for every realm pair ever
//! contacted.
//!
//! **Subsystem ID:** 3  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Rules
//!
//! - Exactly one record per unordered pair, created NEUTRAL with trust 0
//! - Accepted sessions raise trust and befriend (or ally) the pair
//! - Verification failures and cancellations never cost trust
//! - Three consecutive counted failures turn the pair HOSTILE; further
//!   failures while HOSTILE turn it BLOCKED
//! - BLOCKED only clears through [`RelationshipTracker::override_state`]
//!
//! ## Module Structure
//!
//! ```text
//! dp-03-relationship-tracker/
//! ├── domain/    # RelationshipRecord, RelationshipState, PairKey, TrackerConfig
//! └── tracker    # RelationshipTracker (concurrent store)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod tracker;

// Re-exports
pub use domain::{HistoryEntry, PairKey, RelationshipRecord, RelationshipState, TrackerConfig};
pub use tracker::RelationshipTracker;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
