//! # Diplomat Runtime
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Seed the fact source, build the shared components and one agent per realm
//! 3. Start the wire router, the event logger and the expiry sweeper
//! 4. Run the demo exchange between the first two realms
//! 5. Shut down on completion or Ctrl+C
//!
//! ## Demo Exchange
//!
//! ```text
//! A ──GREETING──────────→ B
//! A ←─GREETING_RESPONSE── B
//! A ──TRADE_PROPOSAL────→ B   (B verifies A)
//! A ←─ACKNOWLEDGMENT───── B   VERIFIED
//! A ←─COUNTER_PROPOSAL─── B   round 2
//! A ──ACKNOWLEDGMENT────→ B   ACCEPTED, B commits
//! A ←─ACKNOWLEDGMENT───── B   COMMITTED
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dp_01_envelope_codec::MessageType;
use dp_03_relationship_tracker::RelationshipState;
use dp_04_negotiation::Terms;
use dp_05_protocol_agent::{DiplomacyApi, ProtocolAgent, SessionCommand};
use serde_json::{json, Map, Value};
use shared_bus::{DiplomacyEvent, EventFilter};
use shared_types::{resources, SessionId, SessionOutcome, SessionPhase};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::container::{AgentContainer, RuntimeConfig};
use crate::wire::{Wire, WireRouter};

/// Result of the demo exchange.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// Trade session id.
    pub session_id: SessionId,
    /// Phase the initiator's session ended in.
    pub phase: SessionPhase,
    /// Terminal outcome, if the session closed.
    pub outcome: Option<SessionOutcome>,
    /// Relationship after the exchange.
    pub relationship: RelationshipState,
    /// Trust after the exchange.
    pub trust_score: f64,
}

/// Agents, wire and background tasks.
pub struct DiplomatRuntime {
    container: Arc<AgentContainer>,
    wire: Wire,
    router: Option<WireRouter>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiplomatRuntime {
    /// Build the container and the wire.
    pub fn new(config: RuntimeConfig) -> Self {
        info!("Creating diplomat runtime");
        let container = Arc::new(AgentContainer::new(config));
        let (wire, router) = Wire::new(container.agents().cloned());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            container,
            wire,
            router: Some(router),
            tasks: Vec::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the wire router, event logger and expiry sweeper.
    pub fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Diplomat Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let router = self
            .router
            .take()
            .ok_or_else(|| anyhow!("runtime already started"))?;
        self.tasks.push(tokio::spawn(router.run(self.shutdown_rx.clone())));
        self.tasks.push(self.spawn_event_logger());
        self.tasks.push(self.spawn_sweeper());

        for agent in self.container.agents() {
            info!(realm = %agent.realm(), "Agent ready");
        }
        Ok(())
    }

    fn spawn_event_logger(&self) -> JoinHandle<()> {
        let mut events = self.container.bus.subscribe(EventFilter::all());
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => log_event(&event),
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let container = Arc::clone(&self.container);
        let period = Duration::from_millis(
            (container.config.negotiation.session_ttl_ms / 10).max(1_000),
        );
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for agent in container.agents() {
                            let closed = agent.sweep_expired().await;
                            if closed > 0 {
                                info!(realm = %agent.realm(), closed, "Expired sessions closed");
                            }
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Shared components and agents.
    pub fn container(&self) -> Arc<AgentContainer> {
        Arc::clone(&self.container)
    }

    /// Sending half of the wire.
    pub fn wire(&self) -> &Wire {
        &self.wire
    }

    /// Greeting, then a trade with one counter, between the first two realms.
    pub async fn run_demo(&self) -> Result<DemoReport> {
        let (a, b) = self.demo_pair()?;
        info!(initiator = %a.realm(), counterparty = %b.realm(), "Starting demo exchange");

        let greeting = a
            .initiate(b.realm(), MessageType::Greeting, Map::new())
            .await?
            .envelope
            .context("greeting produced no envelope")?;
        self.exchange(greeting).await?;

        let initiated = a
            .initiate(b.realm(), MessageType::TradeProposal, trade_terms(100, 50))
            .await?;
        let session_id = initiated
            .session_id
            .context("trade proposal opened no session")?;
        if let Some(proposal) = initiated.envelope {
            self.exchange(proposal).await?;
        }

        if b.session(session_id).map(|s| s.phase) == Some(SessionPhase::Negotiation) {
            let terms: Terms = serde_json::from_value(Value::Object(trade_terms(120, 50)))?;
            if let Some(counter) = b
                .advance_session(session_id, SessionCommand::Counter { terms })
                .await?
            {
                self.exchange(counter).await?;
            }
            if let Some(accept) = a
                .advance_session(session_id, SessionCommand::Accept)
                .await?
            {
                self.exchange(accept).await?;
            }
        } else {
            warn!(session_id = %session_id, "Proposal did not reach negotiation");
        }

        let session = a
            .session(session_id)
            .context("trade session disappeared")?;
        let record = a.relationship_with(b.realm());
        let report = DemoReport {
            session_id,
            phase: session.phase,
            outcome: session.outcome,
            relationship: record.state(),
            trust_score: record.trust_score(),
        };
        info!(
            session_id = %report.session_id,
            phase = %report.phase,
            reason = report.outcome.as_ref().map(|o| o.reason.as_str()).unwrap_or(""),
            relationship = %report.relationship,
            trust = report.trust_score,
            "Demo exchange finished"
        );
        Ok(report)
    }

    fn demo_pair(&self) -> Result<(Arc<ProtocolAgent>, Arc<ProtocolAgent>)> {
        let realms = &self.container.config.realms;
        let agent = |i: usize| {
            realms
                .get(i)
                .and_then(|realm| self.container.agent(realm))
                .ok_or_else(|| anyhow!("no agent for demo realm #{i}"))
        };
        Ok((agent(0)?, agent(1)?))
    }

    async fn exchange(&self, envelope: dp_01_envelope_codec::MessageEnvelope) -> Result<()> {
        self.wire.send(envelope)?;
        self.wire.settled().await;
        Ok(())
    }

    /// Signal every background task to stop and wait for them.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Background task did not stop in time");
            }
        }
        info!("Shutdown complete");
    }
}

fn trade_terms(wood: u64, silver: u64) -> Map<String, Value> {
    let mut terms = Map::new();
    terms.insert(
        "offer".into(),
        json!([{"resource": resources::WOOD, "amount": wood}]),
    );
    terms.insert(
        "request".into(),
        json!([{"resource": resources::SILVER, "amount": silver}]),
    );
    terms
}

fn log_event(event: &DiplomacyEvent) {
    match event {
        DiplomacyEvent::SessionCreated {
            realm,
            session_id,
            initiator,
            counterparty,
            topic,
        } => info!(
            realm = %realm,
            session_id = %session_id,
            initiator = %initiator,
            counterparty = %counterparty,
            topic = %topic,
            "[event] session created"
        ),
        DiplomacyEvent::SessionPhaseChanged {
            realm,
            session_id,
            from,
            to,
            round,
        } => info!(
            realm = %realm,
            session_id = %session_id,
            from = %from,
            to = %to,
            round,
            "[event] phase changed"
        ),
        DiplomacyEvent::SessionClosed { realm, outcome } => info!(
            realm = %realm,
            session_id = %outcome.session_id,
            phase = %outcome.phase,
            reason = %outcome.reason,
            rounds = outcome.rounds,
            "[event] session closed"
        ),
        DiplomacyEvent::VerificationResult {
            realm,
            session_id,
            subject,
            granted,
            required_level,
            ..
        } => info!(
            realm = %realm,
            session_id = %session_id,
            subject = %subject,
            granted,
            required = %required_level,
            "[event] verification"
        ),
        DiplomacyEvent::Error {
            realm,
            session_id,
            error,
        } => warn!(
            realm = %realm,
            session_id = ?session_id,
            error = %error,
            "[event] error"
        ),
    }
}
