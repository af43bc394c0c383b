//! # Agent Configuration
//!
//! Immutable per-agent settings, built once at startup.

use dp_04_negotiation::NegotiationConfig;
use shared_types::RealmId;
use std::time::Duration;

use super::execution::TRADE_SYSTEMS_ADDRESS;

/// Protocol agent configuration.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Realm this agent speaks for.
    pub realm: RealmId,
    /// Retries after the first attempt of a delegated call times out.
    pub max_retries: u32,
    /// Deadline for one attempt of a delegated call.
    pub call_timeout: Duration,
    /// Session rules.
    pub negotiation: NegotiationConfig,
    /// Contract that receives execution requests.
    pub contract_address: String,
    /// Ask the reasoning engine for message text on greetings.
    pub compose_messages: bool,
    /// How long a closed session stays readable before the sweep drops it.
    pub closed_retention: Duration,
}

impl AgentConfig {
    /// Defaults for `realm`.
    pub fn new(realm: impl Into<RealmId>) -> Self {
        Self {
            realm: realm.into(),
            max_retries: 3,
            call_timeout: Duration::from_secs(5),
            negotiation: NegotiationConfig::default(),
            contract_address: TRADE_SYSTEMS_ADDRESS.to_string(),
            compose_messages: true,
            closed_retention: Duration::from_secs(600),
        }
    }

    /// Total attempts for one delegated call.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::new("6933");
        assert_eq!(config.realm, RealmId::from("6933"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.attempts(), 4);
        assert_eq!(config.negotiation.max_rounds, 5);
        assert!(config.contract_address.starts_with("0x"));
        assert_eq!(config.closed_retention, Duration::from_secs(600));
    }
}
