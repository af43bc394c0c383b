//! # In-Memory Wire
//!
//! Carries envelopes between agents in the same process. Each delivered
//! envelope goes to the agent named by `target_realm`; its replies are put
//! back on the wire.
//!
//! ```text
//! send ──→ mpsc ──→ router ──→ agent.handle_incoming ──→ replies ──→ mpsc
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dp_01_envelope_codec::{to_wire, MessageEnvelope};
use dp_05_protocol_agent::{DiplomacyApi, ProtocolAgent};
use shared_types::RealmId;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

/// Wire errors.
#[derive(Debug, Error)]
pub enum WireError {
    /// The router has stopped.
    #[error("wire closed")]
    Closed,
}

/// Sending half of the wire.
#[derive(Clone)]
pub struct Wire {
    tx: mpsc::UnboundedSender<MessageEnvelope>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Wire {
    /// Create a wire and the router that drains it.
    pub fn new(agents: impl IntoIterator<Item = Arc<ProtocolAgent>>) -> (Self, WireRouter) {
        let (tx, rx) = mpsc::unbounded_channel();
        let wire = Self {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        };
        let agents = agents
            .into_iter()
            .map(|agent| (agent.realm().clone(), agent))
            .collect();
        let router = WireRouter {
            wire: wire.clone(),
            rx,
            agents,
        };
        (wire, router)
    }

    /// Put an envelope on the wire.
    pub fn send(&self, envelope: MessageEnvelope) -> Result<(), WireError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(envelope).is_err() {
            self.done();
            return Err(WireError::Closed);
        }
        Ok(())
    }

    /// Envelopes sent but not yet handled, replies included.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every envelope on the wire, and every reply it caused, has
    /// been handled.
    pub async fn settled(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn done(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Receiving half of the wire: delivers envelopes to agents.
pub struct WireRouter {
    wire: Wire,
    rx: mpsc::UnboundedReceiver<MessageEnvelope>,
    agents: BTreeMap<RealmId, Arc<ProtocolAgent>>,
}

impl WireRouter {
    /// Deliver envelopes until `shutdown` flips or every sender is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(agents = self.agents.len(), "Wire router started");
        loop {
            tokio::select! {
                envelope = self.rx.recv() => match envelope {
                    Some(envelope) => self.deliver(envelope).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("[wire] Shutdown signal received");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, envelope: MessageEnvelope) {
        match self.agents.get(&envelope.target_realm) {
            Some(agent) => {
                if let Ok(raw) = to_wire(&envelope) {
                    debug!(bytes = raw.len(), wire = %raw, "Delivering");
                }
                match agent.handle_incoming(envelope).await {
                    Ok(replies) => {
                        for reply in replies {
                            if let Err(err) = self.wire.send(reply) {
                                warn!(error = %err, "Reply dropped");
                            }
                        }
                    }
                    // Already published as an error event by the agent.
                    Err(err) => debug!(error = %err, "Delivery failed"),
                }
            }
            None => warn!(
                target = %envelope.target_realm,
                message_type = envelope.message_type.as_str(),
                "No agent for target realm, envelope dropped"
            ),
        }
        self.wire.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{AgentContainer, RuntimeConfig};
    use dp_01_envelope_codec::MessageType;
    use serde_json::Map;

    #[tokio::test]
    async fn test_greeting_round_trip_settles() {
        let container = AgentContainer::new(RuntimeConfig::default());
        let (wire, router) = Wire::new(container.agents().cloned());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(router.run(shutdown_rx));

        let a = container.agent(&RealmId::from("6933")).unwrap();
        let greeting = a
            .initiate(&RealmId::from("7777"), MessageType::Greeting, Map::new())
            .await
            .unwrap()
            .envelope
            .unwrap();
        wire.send(greeting).unwrap();
        wire.settled().await;
        assert_eq!(wire.in_flight(), 0);

        drop(wire);
        task.abort();
    }

    #[tokio::test]
    async fn test_unroutable_envelope_is_dropped() {
        let container = AgentContainer::new(RuntimeConfig::default());
        let (wire, router) = Wire::new(container.agents().cloned());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(router.run(shutdown_rx));

        let envelope = dp_01_envelope_codec::encode_typed(
            MessageType::Greeting,
            &RealmId::from("6933"),
            &RealmId::from("404"),
            &serde_json::json!({}),
            None,
        )
        .unwrap();
        wire.send(envelope).unwrap();
        wire.settled().await;

        shutdown_tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);
    }
}
