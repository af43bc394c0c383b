//! # DP-02 Verification Gate
//!
//! Decides whether a realm may perform an action, from externally supplied
//! facts.
//!
//! **Subsystem ID:** 2  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Authority: granted level (from the realm's level) must be at least the
//!   level the action requires at its volume
//! - Resources: current balances must cover what the realm commits
//! - Orders: an open order can be taken only by a permitted taker, before
//!   expiry, on exactly its listed amounts
//!
//! The gate holds no state. Balances change outside the protocol, so every
//! check re-queries the [`FactProvider`].
//!
//! ## Authority Ceilings
//!
//! | Level | Trade ceiling | Alliances |
//! |-------|---------------|-----------|
//! | LEVEL_1 | greetings only | no |
//! | LEVEL_2 | 100,000 | no |
//! | LEVEL_3 | 1,000,000 | no |
//! | LEVEL_4 | unlimited | yes |
//! | LEVEL_5 | unlimited | yes |
//!
//! ## Module Structure
//!
//! ```text
//! dp-02-verification-gate/
//! ├── domain/     # RealmInfo, VerificationReport, GateError, FactError
//! ├── ports/      # FactProvider
//! ├── adapters/   # InMemoryFactProvider
//! └── gate        # check_authority, check_resource_availability, check_order, verify_proposal
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod gate;
pub mod ports;

// Re-exports
pub use adapters::InMemoryFactProvider;
pub use domain::{
    Available, EntityId, FactError, GateError, Granted, OrderRecord, OrderTake, RealmInfo,
    ResourceBalance, ResourceShortfall, VerificationReport,
};
pub use gate::{
    aggregate, authority_satisfied, check_authority, check_order, check_resource_availability,
    verify_proposal, VerificationGate,
};
pub use ports::FactProvider;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
