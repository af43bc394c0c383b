//! # DP-01 Envelope Codec
//!
//! Structured diplomatic message envelopes and their JSON wire format.
//!
//! **Subsystem ID:** 1  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Give every realm agent one canonical shape for inter-realm messages:
//! - Eight message types with fixed wire names
//! - A single accepted protocol version (`1.0`)
//! - Response messages bound to the message they answer via `reference_id`
//! - Unknown fields carried through untouched for forward compatibility
//!
//! ## Wire Format
//!
//! ```json
//! {
//!   "type": "TRADE_PROPOSAL",
//!   "message_id": "5f0c...",
//!   "source_realm": "6933",
//!   "target_realm": "7777",
//!   "protocol_version": "1.0",
//!   "timestamp": 1704067200000,
//!   "payload": { "offer": [], "request": [] }
//! }
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! dp-01-envelope-codec/
//! ├── domain/    # MessageEnvelope, MessageType, CodecError
//! └── codec      # encode, decode, validate, to_wire
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod domain;

// Re-exports
pub use codec::{decode, decode_validated, decode_value, encode, encode_typed, to_wire, validate};
pub use domain::{CodecError, MessageEnvelope, MessageType, PROTOCOL_VERSION, REQUIRED_FIELDS};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
