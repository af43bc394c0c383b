//! # Domain Module
//!
//! Realm facts, gate verdicts and gate errors.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
