//! # Ports Layer
//!
//! - **Outbound (Driven)**: the fact source the gate queries

pub mod outbound;

pub use outbound::FactProvider;
