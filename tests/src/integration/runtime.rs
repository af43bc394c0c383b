//! # Runtime
//!
//! The assembled runtime: configuration, wire routing and the demo exchange.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Map;

    use diplomat_runtime::container::load_config_from;
    use diplomat_runtime::{DiplomatRuntime, RuntimeConfig};
    use dp_01_envelope_codec::MessageType;
    use dp_03_relationship_tracker::RelationshipState;
    use dp_05_protocol_agent::DiplomacyApi;
    use shared_types::{OutcomeKind, RealmId, SessionPhase};

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[tokio::test]
    async fn test_three_realm_runtime_routes_every_agent() {
        let config = load_config_from(lookup(&[
            ("DP_REALMS", "6933, 7777, 4242"),
            ("DP_CALL_TIMEOUT_MS", "500"),
        ]))
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.realms.len(), 3);

        let mut runtime = DiplomatRuntime::new(config);
        runtime.start().unwrap();
        let report = runtime.run_demo().await.unwrap();
        assert_eq!(report.phase, SessionPhase::Accepted);

        // The third realm reaches the others through the same wire
        let container = runtime.container();
        let third = container.agent(&RealmId::from("4242")).unwrap();
        let greeting = third
            .initiate(&RealmId::from("6933"), MessageType::Greeting, Map::new())
            .await
            .unwrap()
            .envelope
            .unwrap();
        runtime.wire().send(greeting).unwrap();
        tokio::time::timeout(Duration::from_secs(2), runtime.wire().settled())
            .await
            .unwrap();
        assert_eq!(runtime.wire().in_flight(), 0);

        let record = third.relationship_with(&RealmId::from("6933"));
        assert_eq!(record.state(), RelationshipState::Neutral);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_demo_fails_when_counterparty_cannot_pay() {
        // 7777 initiates and asks 6933 for SILVER it does not hold
        let config = RuntimeConfig {
            realms: vec![RealmId::from("7777"), RealmId::from("6933")],
            ..RuntimeConfig::default()
        };
        let mut runtime = DiplomatRuntime::new(config);
        runtime.start().unwrap();
        let report = runtime.run_demo().await.unwrap();
        runtime.shutdown().await;

        assert_eq!(report.phase, SessionPhase::Failed);
        assert_eq!(report.outcome.unwrap().kind, OutcomeKind::ExecutionFailed);
        assert_eq!(report.trust_score, -5.0);
        assert_eq!(report.relationship, RelationshipState::Neutral);
    }

    #[tokio::test]
    async fn test_invalid_config_is_refused() {
        let err = load_config_from(lookup(&[("DP_MAX_ROUNDS", "many")])).unwrap_err();
        assert!(err.to_string().contains("DP_MAX_ROUNDS"));

        let config = RuntimeConfig {
            realms: vec![RealmId::from("6933")],
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
