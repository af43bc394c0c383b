//! # Shared Types Crate
//!
//! Identifiers, authority tiers and the error taxonomy shared by every
//! diplomacy subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **One Error Taxonomy**: Subsystems convert their local errors into
//!   [`DiplomacyError`] before they cross a crate boundary.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
