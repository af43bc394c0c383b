//! # Adapters
//!
//! Concrete fact sources.

pub mod memory;

pub use memory::InMemoryFactProvider;
