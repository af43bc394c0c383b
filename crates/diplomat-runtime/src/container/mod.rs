//! # Agent Container
//!
//! Holds the shared components and one protocol agent per configured realm.
//!
//! - One fact source, relationship tracker and event bus for every agent
//! - Each agent owns its session registry

pub mod agents;
pub mod config;
pub mod seed;

pub use agents::AgentContainer;
pub use config::{load_config, load_config_from, ConfigError, RuntimeConfig};
pub use seed::{seed_facts, RealmSeed};
