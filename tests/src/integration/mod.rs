//! # Integration Tests
//!
//! Agents for several realms sharing one fact source, relationship tracker
//! and event bus. Envelopes are routed in-process by [`fixtures::World`].

pub mod fixtures;

mod concurrency;
mod lifecycle;
mod runtime;
mod scenarios;
