//! # Concurrency
//!
//! Busy sessions, crossing counters and concurrent initiation.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dp_01_envelope_codec::MessageType;
    use dp_05_protocol_agent::{DiplomacyApi, SessionCommand};
    use shared_types::{reasons, DiplomacyError, SessionPhase};

    use crate::integration::fixtures::{realm, terms, trade, World, WorldConfig, A, B, C};

    fn patient_world() -> World {
        World::with_config(WorldConfig {
            call_timeout: Duration::from_millis(500),
            ..WorldConfig::default()
        })
    }

    #[tokio::test]
    async fn test_command_during_verification_is_busy() {
        let world = patient_world();
        let initiated = world
            .agent(A)
            .initiate(&realm(B), MessageType::TradeProposal, trade(100, 50))
            .await
            .unwrap();
        let id = initiated.session_id.unwrap();
        world.facts.set_latency(Some(Duration::from_millis(100)));

        let b = world.agent(B);
        let (verified, busy) = tokio::join!(
            b.handle_incoming(initiated.envelope.unwrap()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                b.advance_session(id, SessionCommand::Counter { terms: terms(90, 50) })
                    .await
            }
        );

        assert_eq!(busy.unwrap_err(), DiplomacyError::state(reasons::SESSION_BUSY));
        let replies = verified.unwrap();
        assert_eq!(replies[0].payload["acknowledges"], serde_json::json!("VERIFIED"));

        let session = b.session(id).unwrap();
        assert_eq!(session.phase, SessionPhase::Negotiation);
        assert_eq!(session.round, 1);
    }

    #[tokio::test]
    async fn test_crossing_counters_converge() {
        let world = World::new();
        let id = world.propose(A, B, 100, 50).await;

        let from_a = world
            .agent(A)
            .advance_session(id, SessionCommand::Counter { terms: terms(110, 40) })
            .await
            .unwrap()
            .unwrap();
        let from_b = world
            .agent(B)
            .advance_session(id, SessionCommand::Counter { terms: terms(90, 60) })
            .await
            .unwrap()
            .unwrap();

        assert!(world.pump(from_a).await.is_empty());
        assert!(world.pump(from_b).await.is_empty());

        let a = world.agent(A).session(id).unwrap();
        let b = world.agent(B).session(id).unwrap();
        assert_eq!(a.round, 2);
        assert_eq!(b.round, 2);
        assert_eq!(a.proposed_terms, b.proposed_terms);

        world.decide(B, id, SessionCommand::Accept).await;
        assert_eq!(world.phase(A, id), SessionPhase::Accepted);
        assert_eq!(world.phase(B, id), SessionPhase::Accepted);
        let order = world.executor.submitted()[0].order().unwrap();
        assert_eq!(order.maker_gives, a.proposed_terms.offer);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initiation_opens_one_session() {
        let world = World::new();
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let agent = world.agent(A);
                tokio::spawn(async move {
                    agent
                        .initiate(&realm(B), MessageType::TradeProposal, trade(10 + i, 5))
                        .await
                })
            })
            .collect();

        let mut sent = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let initiated = handle.await.unwrap().unwrap();
            if initiated.envelope.is_some() {
                sent += 1;
            }
            ids.push(initiated.session_id.unwrap());
        }
        assert_eq!(sent, 1);
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(world.agent(A).sessions().active_count(), 1);
    }

    #[tokio::test]
    async fn test_independent_pairs_progress_together() {
        let world = World::new();
        let (ab, ac) = tokio::join!(world.propose(A, B, 100, 50), world.propose(A, C, 100, 5));
        assert_ne!(ab, ac);
        assert_eq!(world.phase(B, ab), SessionPhase::Negotiation);
        assert_eq!(world.phase(C, ac), SessionPhase::Negotiation);
    }
}
