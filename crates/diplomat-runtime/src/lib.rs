//! # Diplomat Runtime Library
//!
//! Exposes the runtime's modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! - `container/` - configuration, world seed and agent wiring
//! - `wire` - in-memory envelope transport between agents
//! - `runtime` - startup, the demo exchange and shutdown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod runtime;
pub mod wire;

pub use container::{load_config, AgentContainer, ConfigError, RuntimeConfig};
pub use runtime::{DemoReport, DiplomatRuntime};
pub use wire::{Wire, WireError, WireRouter};
