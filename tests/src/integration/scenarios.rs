//! # Protocol Scenarios
//!
//! End-to-end runs of the reference scenarios between realm agents.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use dp_01_envelope_codec::MessageType;
    use dp_03_relationship_tracker::RelationshipState;
    use dp_05_protocol_agent::{DiplomacyApi, ExecutionError, SessionCommand};
    use shared_bus::{DiplomacyEvent, EventFilter};
    use shared_types::{resources, AuthorityLevel, OutcomeKind, SessionPhase};

    use crate::integration::fixtures::{realm, terms, trade, World, A, B, C};

    // =============================================================================
    // SCENARIO 1: FIRST CONTACT
    // =============================================================================

    #[tokio::test]
    async fn test_greeting_first_contact_is_neutral() {
        let world = World::new();
        let greeting = world
            .agent(A)
            .initiate(&realm(B), MessageType::Greeting, Default::default())
            .await
            .unwrap()
            .envelope
            .unwrap();

        let replies = world.agent(B).handle_incoming(greeting.clone()).await.unwrap();
        assert_eq!(replies.len(), 1);
        let response = &replies[0];
        assert_eq!(response.message_type, MessageType::GreetingResponse);
        assert_eq!(response.source_realm, realm(B));
        assert_eq!(response.target_realm, realm(A));
        assert_eq!(response.reference_id, Some(greeting.message_id));
        assert_eq!(response.payload["relationship_state"], json!("NEUTRAL"));

        // Delivering the response back completes the exchange quietly
        assert!(world.agent(A).handle_incoming(response.clone()).await.unwrap().is_empty());
        assert_eq!(world.relationship(A, B).state(), RelationshipState::Neutral);
    }

    // =============================================================================
    // SCENARIO 2: INSUFFICIENT AUTHORITY
    // =============================================================================

    #[tokio::test]
    async fn test_trade_above_ceiling_is_rejected() {
        let world = World::new();
        let mut events = world.bus.subscribe(EventFilter::from_realms(vec![realm(B)]));

        let initiated = world
            .agent(C)
            .initiate(&realm(B), MessageType::TradeProposal, trade(100_000, 50_000))
            .await
            .unwrap();
        let id = initiated.session_id.unwrap();
        let proposal = initiated.envelope.unwrap();

        let replies = world.agent(B).handle_incoming(proposal).await.unwrap();
        assert_eq!(replies[0].message_type, MessageType::Rejection);
        assert_eq!(replies[0].payload["reason"], json!("INSUFFICIENT_AUTHORITY"));
        world.pump(replies[0].clone()).await;

        for agent in [C, B] {
            let session = world.agent(agent).session(id).unwrap();
            assert_eq!(session.phase, SessionPhase::Rejected);
            let outcome = session.outcome.unwrap();
            assert_eq!(outcome.kind, OutcomeKind::VerificationFailed);
            assert_eq!(outcome.reason, "INSUFFICIENT_AUTHORITY");
        }

        let record = world.relationship(C, B);
        assert_eq!(record.trust_score(), 0.0);
        assert_eq!(record.consecutive_failures(), 0);
        assert_eq!(record.state(), RelationshipState::Neutral);

        let verdict = events
            .drain()
            .into_iter()
            .find_map(|e| match e {
                DiplomacyEvent::VerificationResult {
                    granted,
                    required_level,
                    ..
                } => Some((granted, required_level)),
                _ => None,
            })
            .unwrap();
        assert_eq!(verdict, (false, AuthorityLevel::Level3));
    }

    #[tokio::test]
    async fn test_trade_within_ceiling_reaches_negotiation() {
        let world = World::new();
        let id = world.propose(C, B, 60_000, 10).await;
        assert_eq!(world.phase(C, id), SessionPhase::Negotiation);
        assert_eq!(world.phase(B, id), SessionPhase::Negotiation);
    }

    #[tokio::test]
    async fn test_offer_beyond_holdings_is_rejected() {
        let world = World::new();
        let id = world.propose(A, B, 5_000, 10).await;
        let outcome = world.agent(A).session(id).unwrap().outcome.unwrap();
        assert_eq!(outcome.reason, "RESOURCES_UNAVAILABLE");
    }

    // =============================================================================
    // SCENARIO 3: EXHAUSTION
    // =============================================================================

    #[tokio::test]
    async fn test_five_counters_exhaust_negotiation() {
        let world = World::new();
        let id = world.propose(A, B, 100, 50).await;

        for round in 0..5u64 {
            let from = if round % 2 == 0 { B } else { A };
            world
                .decide(
                    from,
                    id,
                    SessionCommand::Counter {
                        terms: terms(100 + round * 10, 50),
                    },
                )
                .await;
            if round < 4 {
                assert_eq!(world.phase(A, id), SessionPhase::Negotiation);
            }
        }

        for agent in [A, B] {
            let outcome = world.agent(agent).session(id).unwrap().outcome.unwrap();
            assert_eq!(outcome.phase, SessionPhase::Rejected);
            assert_eq!(outcome.reason, "NEGOTIATION_EXHAUSTED");
            assert_eq!(outcome.rounds, 5);
        }
        let record = world.relationship(A, B);
        assert_eq!(record.trust_score(), -5.0);
        assert_eq!(record.history().len(), 1);
    }

    // =============================================================================
    // SCENARIO 4: HOSTILITY
    // =============================================================================

    async fn failed_trade(world: &World) {
        let id = world.propose(A, B, 10, 5).await;
        world.decide(B, id, SessionCommand::Accept).await;
        assert_eq!(world.phase(A, id), SessionPhase::Failed);
        assert_eq!(world.phase(B, id), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn test_three_failures_turn_hostile() {
        let world = World::new();
        world
            .executor
            .set_failure(Some(ExecutionError::Reverted("OUT_OF_GAS".into())));

        failed_trade(&world).await;
        failed_trade(&world).await;
        assert_eq!(world.relationship(A, B).state(), RelationshipState::Neutral);

        failed_trade(&world).await;
        let record = world.relationship(A, B);
        assert_eq!(record.state(), RelationshipState::Hostile);
        assert_eq!(record.consecutive_failures(), 3);
        assert_eq!(record.trust_score(), -15.0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let world = World::new();
        world
            .executor
            .set_failure(Some(ExecutionError::Rejected("NONCE".into())));
        failed_trade(&world).await;
        failed_trade(&world).await;

        world.executor.set_failure(None);
        let id = world.propose(A, B, 10, 5).await;
        world.decide(B, id, SessionCommand::Accept).await;
        assert_eq!(world.phase(A, id), SessionPhase::Accepted);

        let record = world.relationship(A, B);
        assert_eq!(record.consecutive_failures(), 0);
        assert_eq!(record.state(), RelationshipState::Friendly);
        assert_eq!(record.trust_score(), 0.0);
    }

    #[tokio::test]
    async fn test_accepted_trade_settles_balances() {
        let world = World::new();
        let id = world.propose(A, B, 100, 50).await;
        world
            .decide(B, id, SessionCommand::Counter { terms: terms(150, 50) })
            .await;
        world.decide(A, id, SessionCommand::Accept).await;

        assert_eq!(world.phase(A, id), SessionPhase::Accepted);
        assert_eq!(world.phase(B, id), SessionPhase::Accepted);
        // B committed the counter terms
        assert_eq!(world.facts.debit(101, resources::WOOD, 0), 850);
        assert_eq!(world.facts.debit(202, resources::WOOD, 0), 150);
        assert_eq!(world.facts.debit(101, resources::SILVER, 0), 50);
        assert_eq!(world.executor.submitted().len(), 1);
    }
}
