//! # Adapters
//!
//! In-process collaborators for the runtime and tests.

pub mod execution;
pub mod reasoning;

pub use execution::{SimulatedExecutor, DUPLICATE_COMMIT};
pub use reasoning::ScriptedReasoner;
