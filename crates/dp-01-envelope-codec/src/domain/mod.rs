//! # Domain Module
//!
//! Envelope, message types and codec errors.

pub mod envelope;
pub mod errors;
pub mod message_type;

pub use envelope::*;
pub use errors::*;
pub use message_type::*;
