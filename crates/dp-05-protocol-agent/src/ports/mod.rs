//! # Ports
//!
//! - `inbound`: what a protocol agent offers its callers
//! - `outbound`: the reasoning and execution collaborators it delegates to

pub mod inbound;
pub mod outbound;

pub use inbound::{DiplomacyApi, Initiated};
pub use outbound::{ExecutionCollaborator, ReasoningEngine};
