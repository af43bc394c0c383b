//! # DP-04 Negotiation
//!
//! Per-session state machine for trade and alliance negotiations.
//!
//! **Subsystem ID:** 4
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Drive one proposal between two realms to a terminal outcome:
//!
//! ```text
//! VERIFICATION ──verify ok──→ NEGOTIATION ──accept──→ EXECUTION ──commit ok──→ ACCEPTED
//!      │                        │    ↺ counter              │
//!      └─verify fail─→ REJECTED ←┘ reject / exhausted        └─commit fail─→ FAILED
//! ```
//!
//! Any non-terminal session fails on expiry, cancellation or exhausted
//! retries. Terminal sessions never change again.
//!
//! ## Concurrency
//!
//! The [`SessionRegistry`] admits one in-flight transition per session.
//! Concurrent counters for the same round converge through a deterministic
//! tie-break (later timestamp, then smaller realm id).
//!
//! ## Module Structure
//!
//! ```text
//! dp-04-negotiation/
//! ├── domain/
//! │   ├── entities.rs      # NegotiationSession, Transition
//! │   ├── events.rs        # SessionEvent
//! │   ├── errors.rs        # NegotiationError
//! │   ├── invariants.rs    # phase ordering, counter tie-break
//! │   └── value_objects.rs # Terms, CounterOffer, NegotiationConfig
//! ├── machine.rs           # transition function
//! └── registry.rs          # SessionRegistry, SessionLease
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod machine;
pub mod registry;

// Re-exports
pub use domain::*;
pub use registry::{Opened, SessionLease, SessionRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
