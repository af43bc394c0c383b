//! # Runtime Configuration
//!
//! Unified configuration for the agents and the components they share.
//!
//! ## Environment
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `DP_REALMS` | `realms` (comma separated) | `6933,7777` |
//! | `DP_MAX_ROUNDS` | `negotiation.max_rounds` | 5 |
//! | `DP_SESSION_TTL_SECS` | `negotiation.session_ttl_ms` | 300 |
//! | `DP_MAX_RETRIES` | `max_retries` | 3 |
//! | `DP_CALL_TIMEOUT_MS` | `call_timeout` | 5000 |
//! | `DP_HOSTILE_BLOCK_THRESHOLD` | `tracker.hostile_block_threshold` | 2 |
//! | `DP_CLOSED_RETENTION_SECS` | `closed_retention` | 600 |
//! | `DP_LOG_LEVEL` | `log_level` | `info` |

use std::collections::HashSet;
use std::time::Duration;

use dp_03_relationship_tracker::TrackerConfig;
use dp_04_negotiation::NegotiationConfig;
use dp_05_protocol_agent::AgentConfig;
use shared_types::RealmId;
use thiserror::Error;
use tracing::info;

/// Realms started when `DP_REALMS` is not set.
pub const DEFAULT_REALMS: [&str; 2] = ["6933", "7777"];

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Realms that get an agent. The first two run the demo exchange.
    pub realms: Vec<RealmId>,
    /// Negotiation limits shared by every agent.
    pub negotiation: NegotiationConfig,
    /// Trust deltas and escalation thresholds.
    pub tracker: TrackerConfig,
    /// Retries after the first attempt of a delegated call.
    pub max_retries: u32,
    /// Deadline per delegated call attempt.
    pub call_timeout: Duration,
    /// Ask the reasoning engine for greeting text.
    pub compose_messages: bool,
    /// How long closed sessions are kept before the sweeper drops them.
    pub closed_retention: Duration,
    /// Fallback log filter when neither `DP_LOG_LEVEL` nor `RUST_LOG` is set.
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            realms: DEFAULT_REALMS.iter().map(|r| RealmId::from(*r)).collect(),
            negotiation: NegotiationConfig::default(),
            tracker: TrackerConfig::default(),
            max_retries: 3,
            call_timeout: Duration::from_secs(5),
            compose_messages: true,
            closed_retention: Duration::from_secs(600),
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Check the configuration before any agent is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realms.len() < 2 {
            return Err(ConfigError::TooFewRealms(self.realms.len()));
        }
        let mut seen = HashSet::new();
        for realm in &self.realms {
            if realm.as_str().is_empty() {
                return Err(ConfigError::EmptyRealm);
            }
            if !seen.insert(realm) {
                return Err(ConfigError::DuplicateRealm(realm.clone()));
            }
        }
        if self.negotiation.max_rounds == 0 {
            return Err(ConfigError::Zero("DP_MAX_ROUNDS"));
        }
        if self.negotiation.session_ttl_ms == 0 {
            return Err(ConfigError::Zero("DP_SESSION_TTL_SECS"));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::Zero("DP_CALL_TIMEOUT_MS"));
        }
        if self.tracker.hostile_block_threshold == 0 {
            return Err(ConfigError::Zero("DP_HOSTILE_BLOCK_THRESHOLD"));
        }
        Ok(())
    }

    /// Agent configuration for one realm.
    pub fn agent_config(&self, realm: &RealmId) -> AgentConfig {
        let mut config = AgentConfig::new(realm.clone());
        config.max_retries = self.max_retries;
        config.call_timeout = self.call_timeout;
        config.negotiation = self.negotiation.clone();
        config.compose_messages = self.compose_messages;
        config.closed_retention = self.closed_retention;
        config
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("{key}={value:?} is not a valid value")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// A limit that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The demo needs two parties.
    #[error("at least two realms are required, got {0}")]
    TooFewRealms(usize),

    /// `DP_REALMS` lists a realm twice.
    #[error("realm {0} listed twice")]
    DuplicateRealm(RealmId),

    /// `DP_REALMS` contains an empty entry.
    #[error("empty realm id")]
    EmptyRealm,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<RuntimeConfig, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration from `lookup`, falling back to defaults for unset keys.
pub fn load_config_from<F>(lookup: F) -> Result<RuntimeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RuntimeConfig::default();

    if let Some(raw) = lookup("DP_REALMS") {
        config.realms = raw.split(',').map(|r| RealmId::from(r.trim())).collect();
        info!(realms = %raw, "Loaded realms from environment");
    }
    if let Some(rounds) = parse(&lookup, "DP_MAX_ROUNDS")? {
        config.negotiation.max_rounds = rounds;
    }
    if let Some(secs) = parse::<u64, _>(&lookup, "DP_SESSION_TTL_SECS")? {
        config.negotiation.session_ttl_ms = secs.saturating_mul(1000);
    }
    if let Some(retries) = parse(&lookup, "DP_MAX_RETRIES")? {
        config.max_retries = retries;
    }
    if let Some(ms) = parse(&lookup, "DP_CALL_TIMEOUT_MS")? {
        config.call_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = parse(&lookup, "DP_CLOSED_RETENTION_SECS")? {
        config.closed_retention = Duration::from_secs(secs);
    }
    if let Some(threshold) = parse(&lookup, "DP_HOSTILE_BLOCK_THRESHOLD")? {
        config.tracker.hostile_block_threshold = threshold;
    }
    if let Some(level) = lookup("DP_LOG_LEVEL") {
        config.log_level = level;
    }

    Ok(config)
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
