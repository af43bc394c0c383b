//! # DP-05 Protocol Agent
//!
//! One realm's diplomatic endpoint: turns incoming envelopes into session
//! transitions and reply envelopes, and local decisions into outgoing ones.
//!
//! **Subsystem ID:** 5
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! The agent composes the other subsystems:
//!
//! | Subsystem | Used for |
//! |-----------|----------|
//! | 1 (Envelope Codec) | decode, validate and build envelopes |
//! | 2 (Verification Gate) | authority and resource checks on proposers |
//! | 3 (Relationship Tracker) | blocked pairs, outcome bookkeeping |
//! | 4 (Negotiation) | per-session state and the busy lease |
//!
//! Collaborator calls (fact source, reasoning engine, execution) run under a
//! per-call deadline with bounded retries. Retries exhausted on timeout close
//! the session as FAILED(`TIMEOUT`).
//!
//! The agent owns no transport. Every handler returns the envelopes to send.
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `ReasoningEngine` | free text for greetings |
//! | `ExecutionCollaborator` | commit accepted terms |
//! | `FactProvider` (dp-02) | realm facts |
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - ScriptedReasoner, SimulatedExecutor                │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - DiplomacyApi trait                         │
//! │  ports/outbound.rs - ReasoningEngine, ExecutionCollaborator     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/   - config, payloads, commands, execution requests     │
//! │  delegate  - deadline and retry around collaborator calls       │
//! │  service   - ProtocolAgent                                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod delegate;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{ScriptedReasoner, SimulatedExecutor, DUPLICATE_COMMIT};
pub use delegate::call_with_retry;
pub use domain::*;
pub use ports::{DiplomacyApi, ExecutionCollaborator, Initiated, ReasoningEngine};
pub use service::{topic_of, ProtocolAgent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
