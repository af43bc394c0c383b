//! # Session Lifecycle
//!
//! Alliances, verification requests, cancellation, expiry and the blocked
//! relationship state across agents.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Map};
    use uuid::Uuid;

    use dp_01_envelope_codec::MessageType;
    use dp_03_relationship_tracker::RelationshipState;
    use dp_04_negotiation::NegotiationConfig;
    use dp_05_protocol_agent::{entrypoints, DiplomacyApi, ExecutionError, SessionCommand};
    use shared_types::{reasons, DiplomacyError, OutcomeKind, SessionPhase};

    use crate::integration::fixtures::{realm, World, WorldConfig, A, B};

    // =============================================================================
    // ALLIANCES AND VERIFICATION REQUESTS
    // =============================================================================

    #[tokio::test]
    async fn test_alliance_commits_and_allies() {
        let world = World::new();
        let mut payload = Map::new();
        payload.insert("purpose".into(), json!("mutual defense"));
        let initiated = world
            .agent(B)
            .initiate(&realm(A), MessageType::AllianceRequest, payload)
            .await
            .unwrap();
        let id = initiated.session_id.unwrap();
        assert!(world.pump(initiated.envelope.unwrap()).await.is_empty());
        assert_eq!(world.phase(A, id), SessionPhase::Negotiation);

        world.decide(A, id, SessionCommand::Accept).await;
        assert_eq!(world.phase(A, id), SessionPhase::Accepted);
        assert_eq!(world.phase(B, id), SessionPhase::Accepted);

        let submitted = world.executor.submitted();
        assert_eq!(submitted[0].entrypoint, entrypoints::FORM_ALLIANCE);
        assert_eq!(submitted[0].calldata, vec![202, 101]);
        assert_eq!(world.relationship(A, B).state(), RelationshipState::Allied);

        let session = world.agent(A).session(id).unwrap();
        assert_eq!(session.proposed_terms.extra["purpose"], json!("mutual defense"));
    }

    #[tokio::test]
    async fn test_alliance_needs_level_four() {
        let world = World::new();
        let initiated = world
            .agent(A)
            .initiate(&realm(B), MessageType::AllianceRequest, Map::new())
            .await
            .unwrap();
        let id = initiated.session_id.unwrap();
        world.pump(initiated.envelope.unwrap()).await;

        let outcome = world.agent(A).session(id).unwrap().outcome.unwrap();
        assert_eq!(outcome.reason, "INSUFFICIENT_AUTHORITY");
    }

    #[tokio::test]
    async fn test_verification_request_reports_authority() {
        let world = World::new();
        let request = world
            .agent(A)
            .initiate(&realm(B), MessageType::Verification, Map::new())
            .await
            .unwrap()
            .envelope
            .unwrap();
        let replies = world.agent(B).handle_incoming(request.clone()).await.unwrap();
        assert_eq!(replies[0].message_type, MessageType::Acknowledgment);
        assert_eq!(replies[0].reference_id, Some(request.message_id));
        assert_eq!(replies[0].payload["acknowledges"], json!("VERIFICATION"));
        assert_eq!(replies[0].payload["authority_level"], json!("LEVEL_5"));
    }

    // =============================================================================
    // CANCELLATION AND EXPIRY
    // =============================================================================

    #[tokio::test]
    async fn test_cancel_reaches_peer_without_trust_change() {
        let world = World::new();
        let id = world.propose(A, B, 100, 50).await;

        let notice = world.agent(B).cancel_session(id).await.unwrap().unwrap();
        assert_eq!(notice.target_realm, realm(A));
        world.pump(notice).await;

        for agent in [A, B] {
            let outcome = world.agent(agent).session(id).unwrap().outcome.unwrap();
            assert_eq!(outcome.kind, OutcomeKind::Cancelled);
            assert_eq!(outcome.phase, SessionPhase::Failed);
        }
        assert!(world.agent(B).cancel_session(id).await.unwrap().is_none());
        assert_eq!(world.relationship(A, B).trust_score(), 0.0);

        // The pair is free for a new session
        let next = world.propose(A, B, 100, 50).await;
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let world = World::with_config(WorldConfig {
            negotiation: NegotiationConfig {
                max_rounds: 5,
                session_ttl_ms: 50,
            },
            ..WorldConfig::default()
        });
        let id = world.propose(A, B, 100, 50).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(world.agent(A).sweep_expired().await, 1);
        assert_eq!(world.agent(B).sweep_expired().await, 1);
        assert_eq!(world.agent(A).sweep_expired().await, 0);

        for agent in [A, B] {
            let outcome = world.agent(agent).session(id).unwrap().outcome.unwrap();
            assert_eq!(outcome.kind, OutcomeKind::Expired);
            assert_eq!(outcome.reason, "EXPIRED");
        }
        let record = world.relationship(A, B);
        assert_eq!(record.trust_score(), -5.0);
        assert_eq!(record.history().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_command_fails() {
        let world = World::new();
        let err = world
            .agent(A)
            .advance_session(Uuid::new_v4(), SessionCommand::Accept)
            .await
            .unwrap_err();
        assert_eq!(err, DiplomacyError::state(reasons::SESSION_NOT_FOUND));
    }

    // =============================================================================
    // BLOCKED RELATIONSHIPS
    // =============================================================================

    async fn failed_trade(world: &World) {
        let id = world.propose(A, B, 10, 5).await;
        world.decide(B, id, SessionCommand::Accept).await;
    }

    #[tokio::test]
    async fn test_hostile_pair_escalates_to_blocked() {
        let world = World::new();
        world
            .executor
            .set_failure(Some(ExecutionError::Reverted("OUT_OF_GAS".into())));
        for _ in 0..4 {
            failed_trade(&world).await;
        }
        assert_eq!(world.relationship(A, B).state(), RelationshipState::Hostile);

        failed_trade(&world).await;
        assert_eq!(world.relationship(A, B).state(), RelationshipState::Blocked);
    }

    #[tokio::test]
    async fn test_blocked_is_sticky_until_override() {
        let world = World::new();
        world
            .tracker
            .override_state(&realm(A), &realm(B), RelationshipState::Blocked);

        for (from, to) in [(A, B), (B, A)] {
            let err = world
                .agent(from)
                .initiate(&realm(to), MessageType::Greeting, Map::new())
                .await
                .unwrap_err();
            assert_eq!(err, DiplomacyError::state(reasons::RELATIONSHIP_BLOCKED));
        }

        // Other pairs are unaffected
        let id = world.propose(A, "1111", 10, 5).await;
        assert_eq!(world.phase(A, id), SessionPhase::Negotiation);
        assert!(world.relationship(A, B).is_blocked());

        world
            .tracker
            .override_state(&realm(A), &realm(B), RelationshipState::Neutral);
        let id = world.propose(A, B, 100, 50).await;
        assert_eq!(world.phase(B, id), SessionPhase::Negotiation);
    }
}
