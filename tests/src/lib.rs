//! # Diplomacy Protocol Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-subsystem scenarios
//!     ├── fixtures.rs   # World: seeded facts, shared tracker and bus, agents
//!     ├── scenarios.rs  # Greeting, authority, exhaustion, hostility
//!     ├── lifecycle.rs  # Alliances, cancellation, expiry, blocking
//!     ├── concurrency.rs  # Busy sessions, crossing counters
//!     └── runtime.rs    # Wire and runtime wiring
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dp-tests
//!
//! # By category
//! cargo test -p dp-tests integration::scenarios::
//!
//! # Benchmarks
//! cargo bench -p dp-tests
//! ```

#![allow(dead_code)]

pub mod integration;
