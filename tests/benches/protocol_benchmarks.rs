//! # Diplomacy Protocol Benchmarks
//!
//! | Component | Operation |
//! |-----------|-----------|
//! | dp-01 Envelope Codec | encode, serialize, decode + validate |
//! | dp-04 Negotiation | verification to exhaustion, crossing counters |
//! | dp-03 Relationship Tracker | outcome application across many pairs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use dp_01_envelope_codec::{decode_validated, encode_typed, to_wire, MessageType};
use dp_03_relationship_tracker::RelationshipTracker;
use dp_04_negotiation::{CounterOffer, NegotiationConfig, NegotiationSession, SessionEvent, Terms};
use serde_json::{json, Map};
use shared_types::{
    resources, OutcomeKind, RealmId, ResourceAmount, SessionOutcome, SessionPhase, Topic,
};
use uuid::Uuid;

fn terms(wood: u64, silver: u64) -> Terms {
    Terms {
        offer: vec![ResourceAmount::new(resources::WOOD, wood)],
        request: vec![ResourceAmount::new(resources::SILVER, silver)],
        ..Terms::default()
    }
}

// ============================================================================
// DP-01: Envelope Codec
// ============================================================================

fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("dp-01-envelope-codec");
    group.measurement_time(Duration::from_secs(5));

    let source = RealmId::from("6933");
    let target = RealmId::from("7777");
    let mut payload = Map::new();
    payload.insert("session_id".into(), json!(Uuid::new_v4()));
    payload.insert("offer".into(), json!([{"resource": resources::WOOD, "amount": 100}]));
    payload.insert("request".into(), json!([{"resource": resources::SILVER, "amount": 50}]));

    group.bench_function("encode_trade_proposal", |b| {
        b.iter(|| {
            black_box(encode_typed(
                MessageType::TradeProposal,
                &source,
                &target,
                &payload,
                None,
            ))
        })
    });

    let envelope = encode_typed(MessageType::TradeProposal, &source, &target, &payload, None)
        .expect("payload is an object");
    group.bench_function("to_wire", |b| b.iter(|| black_box(to_wire(&envelope))));

    let raw = to_wire(&envelope).expect("envelope serializes");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("decode_validated", |b| {
        b.iter(|| black_box(decode_validated(&raw)))
    });

    group.finish();
}

// ============================================================================
// DP-04: Negotiation State Machine
// ============================================================================

fn bench_negotiation_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("dp-04-negotiation");
    let config = NegotiationConfig::default();
    let a = RealmId::from("6933");
    let b = RealmId::from("7777");

    group.bench_function("verify_to_exhaustion", |bench| {
        bench.iter(|| {
            let mut session = NegotiationSession::new(
                Uuid::new_v4(),
                a.clone(),
                b.clone(),
                Topic::Trade,
                terms(100, 50),
                0,
                &config,
            );
            session
                .apply(&SessionEvent::VerifyOk, 1, &config)
                .expect("fresh session verifies");
            for round in 2..=config.max_rounds + 1 {
                let from = if round % 2 == 0 { b.clone() } else { a.clone() };
                let counter = CounterOffer {
                    from,
                    round,
                    timestamp: u64::from(round),
                    terms: terms(100 + u64::from(round), 50),
                };
                let _ = session.apply(&SessionEvent::Counter(counter), u64::from(round), &config);
            }
            black_box(session.phase)
        })
    });

    group.bench_function("crossing_counter_tie_break", |bench| {
        let mut base = NegotiationSession::new(
            Uuid::new_v4(),
            a.clone(),
            b.clone(),
            Topic::Trade,
            terms(100, 50),
            0,
            &config,
        );
        base.apply(&SessionEvent::VerifyOk, 1, &config)
            .expect("fresh session verifies");
        let mine = SessionEvent::Counter(CounterOffer {
            from: a.clone(),
            round: 2,
            timestamp: 10,
            terms: terms(110, 40),
        });
        let theirs = SessionEvent::Counter(CounterOffer {
            from: b.clone(),
            round: 2,
            timestamp: 10,
            terms: terms(90, 60),
        });
        bench.iter(|| {
            let mut session = base.clone();
            let _ = session.apply(&mine, 2, &config);
            let _ = session.apply(&theirs, 3, &config);
            black_box(session.round)
        })
    });

    group.finish();
}

// ============================================================================
// DP-03: Relationship Tracker
// ============================================================================

fn bench_relationship_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("dp-03-relationship-tracker");

    for pairs in [10usize, 100, 1_000] {
        let outcomes: Vec<SessionOutcome> = (0..pairs)
            .map(|i| SessionOutcome {
                session_id: Uuid::new_v4(),
                realm_a: RealmId::from(format!("{}", 1_000 + i)),
                realm_b: RealmId::from("7777"),
                topic: Topic::Trade,
                phase: SessionPhase::Accepted,
                kind: OutcomeKind::Completed,
                reason: "COMPLETED".to_string(),
                rounds: 1,
                closed_at: 0,
            })
            .collect();

        group.throughput(Throughput::Elements(pairs as u64));
        group.bench_with_input(
            BenchmarkId::new("apply_outcomes", pairs),
            &outcomes,
            |bench, outcomes| {
                bench.iter(|| {
                    let tracker = RelationshipTracker::default();
                    for outcome in outcomes {
                        black_box(tracker.apply_outcome(outcome));
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    name = protocol_benches;
    config = Criterion::default().sample_size(50);
    targets =
        bench_envelope_codec,
        bench_negotiation_machine,
        bench_relationship_tracker,
);

criterion_main!(protocol_benches);
