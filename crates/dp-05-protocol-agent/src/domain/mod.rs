//! # Domain Module
//!
//! Agent configuration, payload shapes and execution requests.

pub mod commands;
pub mod config;
pub mod errors;
pub mod execution;
pub mod payloads;

pub use commands::*;
pub use config::*;
pub use errors::*;
pub use execution::*;
pub use payloads::*;
