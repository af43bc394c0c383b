//! # Protocol Agent Service
//!
//! Per-realm façade over the envelope codec, verification gate,
//! relationship tracker and negotiation registry.
//!
//! ## Message handling
//!
//! | Incoming | Action | Reply |
//! |----------|--------|-------|
//! | `GREETING` | record first contact | `GREETING_RESPONSE` |
//! | `VERIFICATION` | report own authority | `ACKNOWLEDGMENT` |
//! | `TRADE_PROPOSAL`, `ALLIANCE_REQUEST` | open session, run gate (and the order check when terms name a `trade_id`) | `ACKNOWLEDGMENT` (VERIFIED) or `REJECTION` |
//! | `ACKNOWLEDGMENT` VERIFIED | verify ok | none |
//! | `ACKNOWLEDGMENT` ACCEPTED | accept, commit | `ACKNOWLEDGMENT` (COMMITTED) or `REJECTION` |
//! | `ACKNOWLEDGMENT` COMMITTED | commit ok | none |
//! | `COUNTER_PROPOSAL` | counter | none |
//! | `REJECTION` | reject, verify fail, commit fail or cancel by phase | none |
//!
//! Every session mutation goes through the registry. Errors are published
//! as `error` events; unexpected ones also force the session FAILED.

use async_trait::async_trait;
use dp_01_envelope_codec::{
    decode_validated, encode_typed, validate, CodecError, MessageEnvelope, MessageType,
};
use dp_02_verification_gate::{
    FactError, GateError, OrderRecord, OrderTake, RealmInfo, VerificationGate,
};
use dp_03_relationship_tracker::{RelationshipRecord, RelationshipTracker};
use dp_04_negotiation::{
    CounterOffer, NegotiationSession, SessionEvent, SessionRegistry, Terms, Transition,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use shared_bus::{DiplomacyEvent, EventFilter, EventPublisher, InMemoryEventBus, Subscription};
use shared_types::{
    now_millis, reasons, AuthorityLevel, DiplomacyError, DiplomacyResult, ErrorKind,
    OutcomeKind, RealmId, ResourceAmount, SessionId, SessionPhase, Topic,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delegate::call_with_retry;
use crate::domain::{
    acks, AcceptCall, AckPayload, AgentConfig, CommitReceipt, DelegateError, ExecutionRequest,
    GreetingPayload, GreetingResponsePayload, OrderCall, RejectionPayload, SessionCommand,
    TermsPayload, AWAITING_VERIFICATION, ESTABLISH_COMMUNICATION,
};
use crate::ports::{DiplomacyApi, ExecutionCollaborator, Initiated, ReasoningEngine};

/// Topic opened by an initiating message type.
pub fn topic_of(message_type: MessageType) -> Option<Topic> {
    match message_type {
        MessageType::TradeProposal => Some(Topic::Trade),
        MessageType::AllianceRequest => Some(Topic::Alliance),
        _ => None,
    }
}

fn format_error(what: &str) -> DiplomacyError {
    DiplomacyError::Format(format!("invalid {what} payload"))
}

/// The protocol agent for one realm.
pub struct ProtocolAgent {
    config: AgentConfig,
    gate: VerificationGate,
    tracker: Arc<RelationshipTracker>,
    sessions: SessionRegistry,
    bus: Arc<InMemoryEventBus>,
    reasoner: Arc<dyn ReasoningEngine>,
    executor: Arc<dyn ExecutionCollaborator>,
    /// Last envelope received per session, the target of `reference_id`.
    last_inbound: RwLock<HashMap<SessionId, Uuid>>,
}

impl ProtocolAgent {
    /// Create an agent. `tracker` and `bus` may be shared with other agents.
    pub fn new(
        config: AgentConfig,
        gate: VerificationGate,
        tracker: Arc<RelationshipTracker>,
        bus: Arc<InMemoryEventBus>,
        reasoner: Arc<dyn ReasoningEngine>,
        executor: Arc<dyn ExecutionCollaborator>,
    ) -> Self {
        let sessions = SessionRegistry::new(config.negotiation.clone());
        Self {
            config,
            gate,
            tracker,
            sessions,
            bus,
            reasoner,
            executor,
            last_inbound: RwLock::new(HashMap::new()),
        }
    }

    /// Realm this agent speaks for.
    pub fn realm(&self) -> &RealmId {
        &self.config.realm
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Sessions known to this agent.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Shared relationship store.
    pub fn tracker(&self) -> &Arc<RelationshipTracker> {
        &self.tracker
    }

    /// Subscribe to lifecycle events on this agent's bus.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// Decode, validate and handle one raw wire message.
    pub async fn handle_raw(&self, raw: &str) -> DiplomacyResult<Vec<MessageEnvelope>> {
        match decode_validated(raw) {
            Ok(envelope) => self.handle_incoming(envelope).await,
            Err(err) => {
                let err = DiplomacyError::from(err);
                self.emit_error(None, &err).await;
                Err(err)
            }
        }
    }

    /// Close every idle session past its deadline, then drop sessions closed
    /// longer than `closed_retention` ago. Returns how many closed.
    pub async fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let closed = self.sessions.sweep_expired(now);
        for t in &closed {
            self.record(t).await;
        }

        let retention = u64::try_from(self.config.closed_retention.as_millis()).unwrap_or(u64::MAX);
        let purged = self.sessions.purge_closed(now.saturating_sub(retention));
        if purged > 0 {
            let sessions = &self.sessions;
            self.last_inbound
                .write()
                .retain(|id, _| sessions.get(id).is_some());
            debug!(realm = %self.realm(), purged, "Closed sessions purged");
        }
        closed.len()
    }

    /// This realm's authority according to the fact source.
    ///
    /// Falls back to `LEVEL_1` if the fact source cannot answer.
    pub async fn authority(&self) -> AuthorityLevel {
        match self.lookup(self.realm()).await {
            Ok(info) => info.authority(),
            Err(err) => {
                warn!(realm = %self.realm(), error = %err, "Own authority unknown, assuming LEVEL_1");
                AuthorityLevel::Level1
            }
        }
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    fn envelope<P: Serialize + ?Sized>(
        &self,
        message_type: MessageType,
        target: &RealmId,
        payload: &P,
        reference_id: Option<Uuid>,
    ) -> DiplomacyResult<MessageEnvelope> {
        Ok(encode_typed(
            message_type,
            self.realm(),
            target,
            payload,
            reference_id,
        )?)
    }

    fn rejection(
        &self,
        target: &RealmId,
        session_id: Option<SessionId>,
        reason: &str,
        reference_id: Uuid,
    ) -> DiplomacyResult<MessageEnvelope> {
        let body = RejectionPayload {
            reason: reason.to_string(),
            session_id,
        };
        self.envelope(MessageType::Rejection, target, &body, Some(reference_id))
    }

    fn reference_for(&self, session_id: SessionId) -> Uuid {
        self.last_inbound
            .read()
            .get(&session_id)
            .copied()
            .unwrap_or(session_id)
    }

    fn ensure_not_blocked(&self, peer: &RealmId) -> DiplomacyResult<()> {
        if self.tracker.is_blocked(self.realm(), peer) {
            debug!(realm = %self.realm(), peer = %peer, "Relationship blocked");
            return Err(DiplomacyError::state(reasons::RELATIONSHIP_BLOCKED));
        }
        Ok(())
    }

    async fn emit(&self, event: DiplomacyEvent) {
        self.bus.publish(event).await;
    }

    async fn emit_error(&self, session_id: Option<SessionId>, error: &DiplomacyError) {
        warn!(
            realm = %self.realm(),
            session_id = ?session_id,
            kind = ?error.kind(),
            reason = error.reason(),
            "Diplomacy error"
        );
        self.emit(DiplomacyEvent::Error {
            realm: self.realm().clone(),
            session_id,
            error: error.clone(),
        })
        .await;
    }

    /// Publish a transition and feed terminal outcomes to the tracker.
    async fn record(&self, t: &Transition) {
        if !t.applied {
            return;
        }
        self.emit(DiplomacyEvent::SessionPhaseChanged {
            realm: self.realm().clone(),
            session_id: t.session_id,
            from: t.from,
            to: t.to,
            round: t.round,
        })
        .await;

        if let Some(outcome) = &t.outcome {
            self.last_inbound.write().remove(&t.session_id);
            self.tracker.apply_outcome(outcome);
            self.emit(DiplomacyEvent::SessionClosed {
                realm: self.realm().clone(),
                outcome: outcome.clone(),
            })
            .await;
        }
    }

    /// Report an error at the agent boundary. Internal faults also force the
    /// session FAILED(`INTERNAL`).
    async fn fail<T>(&self, session_id: Option<SessionId>, err: DiplomacyError) -> DiplomacyResult<T> {
        self.emit_error(session_id, &err).await;
        if err.kind() == ErrorKind::Internal {
            if let Some(id) = session_id {
                self.abort(id).await;
            }
        }
        Err(err)
    }

    async fn abort(&self, session_id: SessionId) {
        let event = SessionEvent::Abort {
            reason: reasons::INTERNAL.to_string(),
        };
        match self.sessions.advance(&session_id, &event, now_millis()) {
            Ok(t) => self.record(&t).await,
            Err(err) => debug!(session_id = %session_id, error = %err, "Abort not applied"),
        }
    }

    async fn lookup(&self, realm: &RealmId) -> Result<RealmInfo, DelegateError<FactError>> {
        let facts = self.gate.facts();
        call_with_retry(
            "realm_info",
            self.config.call_timeout,
            self.config.attempts(),
            move || facts.realm_info(realm),
        )
        .await
    }

    /// Ask the reasoning engine for message text. Failures are reported and
    /// the message goes out without text.
    async fn compose(&self, prompt: &MessageEnvelope) -> Option<String> {
        let reasoner = &self.reasoner;
        debug!(realm = %self.realm(), prompt = %prompt.message_id, "think:start");
        let result = call_with_retry(
            "think",
            self.config.call_timeout,
            self.config.attempts(),
            move || reasoner.think(prompt),
        )
        .await;

        match result {
            Ok(text) => {
                debug!(realm = %self.realm(), chars = text.len(), "think:complete");
                Some(text)
            }
            Err(DelegateError::TimedOut { attempts, .. }) => {
                warn!(realm = %self.realm(), attempts, "think:timeout");
                self.emit_error(None, &DiplomacyError::Timeout(reasons::TIMEOUT.into()))
                    .await;
                None
            }
            Err(DelegateError::Failed(err)) => {
                warn!(realm = %self.realm(), error = %err, "think:error");
                self.emit_error(None, &DiplomacyError::Internal(err.to_string()))
                    .await;
                None
            }
        }
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    async fn dispatch(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        validate(envelope)?;
        if envelope.target_realm != *self.realm() {
            return Err(DiplomacyError::Format(format!(
                "envelope addressed to {}",
                envelope.target_realm
            )));
        }
        let peer = &envelope.source_realm;
        self.ensure_not_blocked(peer)?;

        let session_id = envelope.payload_field::<SessionId>("session_id");
        let session = session_id.and_then(|id| self.sessions.get(&id));
        if session.is_some_and(|s| !s.involves(peer)) {
            debug!(
                realm = %self.realm(),
                peer = %peer,
                session_id = ?session_id,
                "Message from outside the session"
            );
            return Err(DiplomacyError::state(reasons::SESSION_NOT_FOUND));
        }

        debug!(
            realm = %self.realm(),
            peer = %peer,
            message_type = envelope.message_type.as_str(),
            "Envelope received"
        );

        let replies = match envelope.message_type {
            MessageType::Greeting => self.on_greeting(envelope).await,
            MessageType::GreetingResponse => {
                let record = self.tracker.get_or_create(self.realm(), peer);
                debug!(peer = %peer, state = %record.state(), "Greeting answered");
                Ok(vec![])
            }
            MessageType::Verification => self.on_verification(envelope).await,
            MessageType::TradeProposal | MessageType::AllianceRequest => {
                self.on_proposal(envelope).await
            }
            MessageType::Acknowledgment => self.on_ack(envelope).await,
            MessageType::CounterProposal => self.on_counter(envelope).await,
            MessageType::Rejection => self.on_rejection(envelope).await,
        }?;

        if let Some(id) = session_id {
            self.note_inbound(id, envelope.message_id);
        }
        Ok(replies)
    }

    /// Remember `message_id` as the reply target of a live session. Ids of
    /// unknown or closed sessions are not stored.
    fn note_inbound(&self, session_id: SessionId, message_id: Uuid) {
        let live = self
            .sessions
            .get(&session_id)
            .is_some_and(|s| !s.is_terminal());
        if live {
            self.last_inbound.write().insert(session_id, message_id);
        }
    }

    #[cfg(test)]
    fn inbound_len(&self) -> usize {
        self.last_inbound.read().len()
    }

    async fn on_greeting(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let peer = &envelope.source_realm;
        let record = self.tracker.get_or_create(self.realm(), peer);
        let message = if self.config.compose_messages {
            self.compose(envelope).await
        } else {
            None
        };
        let body = GreetingResponsePayload {
            acknowledgment: acks::RECEIVED.to_string(),
            authority_level: self.authority().await,
            relationship_state: record.state(),
            next_action: AWAITING_VERIFICATION.to_string(),
            message,
        };
        info!(realm = %self.realm(), peer = %peer, state = %record.state(), "Greeting received");
        Ok(vec![self.envelope(
            MessageType::GreetingResponse,
            peer,
            &body,
            Some(envelope.message_id),
        )?])
    }

    async fn on_verification(
        &self,
        envelope: &MessageEnvelope,
    ) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let body = AckPayload {
            acknowledges: acks::VERIFICATION.to_string(),
            session_id: envelope.payload_field("session_id"),
            round: None,
            authority_level: Some(self.authority().await),
            transaction_hash: None,
        };
        Ok(vec![self.envelope(
            MessageType::Acknowledgment,
            &envelope.source_realm,
            &body,
            Some(envelope.message_id),
        )?])
    }

    async fn on_proposal(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let peer = &envelope.source_realm;
        let topic = topic_of(envelope.message_type).ok_or_else(|| format_error("proposal"))?;
        let body: TermsPayload = envelope
            .payload_as()
            .ok_or_else(|| format_error("proposal"))?;
        let id = body.session_id;

        let opened = self.sessions.open_with_id(
            id,
            peer,
            self.realm(),
            topic,
            body.terms.clone(),
            now_millis(),
        )?;
        if let Some(t) = &opened.expired {
            self.record(t).await;
        }
        if !opened.created {
            if opened.session.id == id {
                debug!(session_id = %id, "Proposal replayed, ignored");
                return Ok(vec![]);
            }
            info!(
                session_id = %id,
                active = %opened.session.id,
                "Proposal collides with active session"
            );
            return Ok(vec![self.rejection(
                peer,
                Some(id),
                reasons::SESSION_BUSY,
                envelope.message_id,
            )?]);
        }

        self.emit(DiplomacyEvent::SessionCreated {
            realm: self.realm().clone(),
            session_id: id,
            initiator: peer.clone(),
            counterparty: self.realm().clone(),
            topic,
        })
        .await;

        let lease = self.sessions.begin(&id)?;
        let event = match self.verify(id, peer, topic, &body.terms).await {
            Ok(event) => event,
            Err(err) => {
                // Provider fault: close under the lease and tell the proposer.
                self.emit_error(Some(id), &err).await;
                SessionEvent::Abort {
                    reason: reasons::INTERNAL.to_string(),
                }
            }
        };
        let t = lease.apply(&event, now_millis())?;
        drop(lease);
        self.record(&t).await;

        let reply = match &t.outcome {
            Some(outcome) => self.rejection(peer, Some(id), &outcome.reason, envelope.message_id)?,
            None => {
                let mut ack = AckPayload::session(acks::VERIFIED, id);
                ack.round = Some(t.round);
                self.envelope(MessageType::Acknowledgment, peer, &ack, Some(envelope.message_id))?
            }
        };
        Ok(vec![reply])
    }

    /// Run the gate on the proposer. Provider faults come back as `Err`.
    async fn verify(
        &self,
        session_id: SessionId,
        subject: &RealmId,
        topic: Topic,
        terms: &Terms,
    ) -> DiplomacyResult<SessionEvent> {
        let gate = &self.gate;
        let action = topic.action();
        let volume = terms.volume();
        let committed = terms.offer.as_slice();
        let verdict = call_with_retry(
            "verify_proposal",
            self.config.call_timeout,
            self.config.attempts(),
            move || gate.verify_proposal(subject, action, volume, committed),
        )
        .await;

        match verdict {
            Ok(report) => {
                let reason = report.reason();
                info!(
                    session_id = %session_id,
                    subject = %subject,
                    required = %report.required_level,
                    granted = ?report.granted_level,
                    reason = reason.unwrap_or(""),
                    "Verification result"
                );
                self.emit(DiplomacyEvent::VerificationResult {
                    realm: self.realm().clone(),
                    session_id,
                    subject: subject.clone(),
                    granted: report.is_granted(),
                    required_level: report.required_level,
                    granted_level: report.granted_level,
                    reason: reason.map(str::to_string),
                })
                .await;
                match (reason, terms.trade_id) {
                    (Some(reason), _) => Ok(SessionEvent::VerifyFail {
                        reason: reason.to_string(),
                    }),
                    (None, Some(trade_id)) if topic == Topic::Trade => {
                        self.verify_take(session_id, trade_id, subject, terms).await
                    }
                    (None, _) => Ok(SessionEvent::VerifyOk),
                }
            }
            Err(DelegateError::TimedOut { .. }) => {
                self.emit_error(Some(session_id), &DelegateError::<GateError>::timeout_error())
                    .await;
                Ok(SessionEvent::TimeoutExhausted)
            }
            Err(DelegateError::Failed(err)) => Err(err.into()),
        }
    }

    /// The proposer wants to take one of this realm's open orders.
    async fn verify_take(
        &self,
        session_id: SessionId,
        trade_id: u64,
        taker: &RealmId,
        terms: &Terms,
    ) -> DiplomacyResult<SessionEvent> {
        match self.check_take(trade_id, self.realm(), taker, terms).await {
            Ok(order) => {
                debug!(session_id = %session_id, trade_id = order.trade_id, "Order available");
                Ok(SessionEvent::VerifyOk)
            }
            Err(DelegateError::Failed(err)) if err.is_verdict() => {
                info!(session_id = %session_id, trade_id, taker = %taker, "Order unavailable");
                Ok(SessionEvent::VerifyFail {
                    reason: err.reason().to_string(),
                })
            }
            Err(DelegateError::Failed(err)) => Err(err.into()),
            Err(DelegateError::TimedOut { .. }) => {
                self.emit_error(Some(session_id), &DelegateError::<GateError>::timeout_error())
                    .await;
                Ok(SessionEvent::TimeoutExhausted)
            }
        }
    }

    async fn check_take(
        &self,
        trade_id: u64,
        maker: &RealmId,
        taker: &RealmId,
        terms: &Terms,
    ) -> Result<OrderRecord, DelegateError<GateError>> {
        let gate = &self.gate;
        let take = OrderTake {
            trade_id,
            maker,
            taker,
            pays: &terms.offer,
            receives: &terms.request,
        };
        let take = &take;
        call_with_retry(
            "check_order",
            self.config.call_timeout,
            self.config.attempts(),
            move || gate.check_order(take),
        )
        .await
    }

    async fn on_ack(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let body: AckPayload = envelope
            .payload_as()
            .ok_or_else(|| format_error("acknowledgment"))?;
        let event = match body.acknowledges.as_str() {
            acks::VERIFIED => SessionEvent::VerifyOk,
            acks::COMMITTED => SessionEvent::CommitOk,
            acks::ACCEPTED => return self.on_accepted(envelope, &body).await,
            other => {
                debug!(realm = %self.realm(), acknowledges = other, "Acknowledgment noted");
                return Ok(vec![]);
            }
        };
        let id = body
            .session_id
            .ok_or_else(|| format_error("acknowledgment"))?;
        let t = self.sessions.advance(&id, &event, now_millis())?;
        self.record(&t).await;
        Ok(vec![])
    }

    async fn on_accepted(
        &self,
        envelope: &MessageEnvelope,
        body: &AckPayload,
    ) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let peer = &envelope.source_realm;
        let id = body.session_id.ok_or_else(|| format_error("acknowledgment"))?;
        let lease = self.sessions.begin(&id)?;
        let current = lease.session().round;
        let round = body.round.unwrap_or(current);

        let t = lease.apply(&SessionEvent::Accept { round }, now_millis())?;
        self.record(&t).await;
        if let Some(outcome) = &t.outcome {
            return Ok(vec![self.rejection(
                peer,
                Some(id),
                &outcome.reason,
                envelope.message_id,
            )?]);
        }

        let session = lease.session();
        let (event, receipt) = self.execute(&session).await;
        let t = lease.apply(&event, now_millis())?;
        drop(lease);
        self.record(&t).await;

        let reply = match (&t.outcome, receipt) {
            (Some(outcome), Some(receipt)) if outcome.kind == OutcomeKind::Completed => {
                let mut ack = AckPayload::session(acks::COMMITTED, id);
                ack.transaction_hash = Some(receipt.transaction_hash);
                self.envelope(MessageType::Acknowledgment, peer, &ack, Some(envelope.message_id))?
            }
            (Some(outcome), _) => {
                self.rejection(peer, Some(id), &outcome.reason, envelope.message_id)?
            }
            (None, _) => return Err(DiplomacyError::Internal("commit left session open".into())),
        };
        Ok(vec![reply])
    }

    /// Fresh resource check, request construction and commit for a session
    /// in EXECUTION. Returns the event that settles it.
    async fn execute(
        &self,
        session: &NegotiationSession,
    ) -> (SessionEvent, Option<CommitReceipt>) {
        let request = match self.build_request(session).await {
            Ok(request) => request,
            Err(event) => return (event, None),
        };
        info!(
            session_id = %session.id,
            entrypoint = %request.entrypoint,
            calldata_len = request.calldata.len(),
            "Committing"
        );

        let executor = &self.executor;
        let request = &request;
        let result = call_with_retry(
            "commit",
            self.config.call_timeout,
            self.config.attempts(),
            move || executor.commit(request.clone()),
        )
        .await;

        match result {
            Ok(receipt) => (SessionEvent::CommitOk, Some(receipt)),
            Err(DelegateError::TimedOut { .. }) => {
                self.emit_error(Some(session.id), &DelegateError::<()>::timeout_error())
                    .await;
                (SessionEvent::TimeoutExhausted, None)
            }
            Err(DelegateError::Failed(err)) => {
                let reason = err.reason();
                self.emit_error(Some(session.id), &err.into()).await;
                (SessionEvent::CommitFail { reason }, None)
            }
        }
    }

    async fn build_request(
        &self,
        session: &NegotiationSession,
    ) -> Result<ExecutionRequest, SessionEvent> {
        let a = self.resolve(session, &session.realm_a).await?;
        let b = self.resolve(session, &session.realm_b).await?;

        match session.topic {
            Topic::Alliance => Ok(ExecutionRequest::form_alliance(
                &self.config.contract_address,
                session.id,
                a.entity_id,
                b.entity_id,
            )),
            Topic::Trade => {
                let terms = &session.proposed_terms;
                self.recheck(session, &a.realm_id, &terms.offer).await?;
                self.recheck(session, &b.realm_id, &terms.request).await?;
                let Some(trade_id) = terms.trade_id else {
                    return Ok(ExecutionRequest::create_order(
                        &self.config.contract_address,
                        session.id,
                        &OrderCall {
                            maker_id: a.entity_id,
                            maker_gives: terms.offer.clone(),
                            taker_id: b.entity_id,
                            taker_gives: terms.request.clone(),
                            expires_at: session.expires_at / 1000,
                        },
                    ));
                };

                // The responder made the order; the initiator takes it.
                match self.check_take(trade_id, &b.realm_id, &a.realm_id, terms).await {
                    Ok(_) => {}
                    Err(DelegateError::Failed(err)) if err.is_verdict() => {
                        return Err(SessionEvent::CommitFail {
                            reason: err.reason().to_string(),
                        })
                    }
                    Err(err) => return Err(self.delegation_failed(session.id, err).await),
                }
                Ok(ExecutionRequest::accept_order(
                    &self.config.contract_address,
                    session.id,
                    &AcceptCall {
                        taker_id: a.entity_id,
                        trade_id,
                        maker_gives: terms.request.clone(),
                        taker_gives: terms.offer.clone(),
                    },
                ))
            }
        }
    }

    async fn resolve(
        &self,
        session: &NegotiationSession,
        realm: &RealmId,
    ) -> Result<RealmInfo, SessionEvent> {
        match self.lookup(realm).await {
            Ok(info) => Ok(info),
            Err(DelegateError::Failed(FactError::UnknownRealm(_))) => {
                Err(SessionEvent::CommitFail {
                    reason: "UNKNOWN_REALM".to_string(),
                })
            }
            Err(err) => Err(self.delegation_failed(session.id, err).await),
        }
    }

    /// Balances change outside the protocol, so they are queried again right
    /// before commit.
    async fn recheck(
        &self,
        session: &NegotiationSession,
        realm: &RealmId,
        gives: &[ResourceAmount],
    ) -> Result<(), SessionEvent> {
        let gate = &self.gate;
        let result = call_with_retry(
            "check_resource_availability",
            self.config.call_timeout,
            self.config.attempts(),
            move || gate.check_resource_availability(realm, gives),
        )
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(DelegateError::Failed(err)) if err.is_verdict() => Err(SessionEvent::CommitFail {
                reason: err.reason().to_string(),
            }),
            Err(DelegateError::Failed(err)) => Err(self
                .delegation_failed(session.id, DelegateError::Failed(err))
                .await),
            Err(DelegateError::TimedOut { call, attempts }) => Err(self
                .delegation_failed(session.id, DelegateError::<GateError>::TimedOut { call, attempts })
                .await),
        }
    }

    async fn delegation_failed<E: std::fmt::Display>(
        &self,
        session_id: SessionId,
        err: DelegateError<E>,
    ) -> SessionEvent {
        match err {
            DelegateError::TimedOut { .. } => {
                self.emit_error(Some(session_id), &DelegateError::<E>::timeout_error())
                    .await;
                SessionEvent::TimeoutExhausted
            }
            DelegateError::Failed(e) => {
                self.emit_error(Some(session_id), &DiplomacyError::Internal(e.to_string()))
                    .await;
                SessionEvent::Abort {
                    reason: reasons::INTERNAL.to_string(),
                }
            }
        }
    }

    async fn on_counter(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let body: TermsPayload = envelope
            .payload_as()
            .ok_or_else(|| format_error("counter"))?;
        let counter = CounterOffer {
            from: envelope.source_realm.clone(),
            round: body.round,
            timestamp: u64::try_from(envelope.timestamp).unwrap_or_default(),
            terms: body.terms,
        };
        let t = self.sessions.advance(
            &body.session_id,
            &SessionEvent::Counter(counter),
            now_millis(),
        )?;
        self.record(&t).await;
        Ok(vec![])
    }

    async fn on_rejection(&self, envelope: &MessageEnvelope) -> DiplomacyResult<Vec<MessageEnvelope>> {
        let body: RejectionPayload = envelope
            .payload_as()
            .ok_or_else(|| format_error("rejection"))?;
        let Some(id) = body.session_id else {
            info!(peer = %envelope.source_realm, reason = %body.reason, "Peer rejected");
            return Ok(vec![]);
        };
        let session = self
            .sessions
            .get(&id)
            .ok_or_else(|| DiplomacyError::state(reasons::SESSION_NOT_FOUND))?;
        if session.is_terminal() {
            return Ok(vec![]);
        }

        let reason = body.reason;
        let event = match (reason.as_str(), session.phase) {
            (reasons::CANCELLED, _) => SessionEvent::Cancel,
            (reasons::TIMEOUT, _) => SessionEvent::TimeoutExhausted,
            (reasons::INTERNAL, _) => SessionEvent::Abort { reason },
            (_, SessionPhase::Verification) => SessionEvent::VerifyFail { reason },
            (_, SessionPhase::Execution) => SessionEvent::CommitFail { reason },
            _ => SessionEvent::Reject {
                reason: Some(reason),
            },
        };
        let t = self.sessions.advance(&id, &event, now_millis())?;
        self.record(&t).await;
        Ok(vec![])
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    async fn start(
        &self,
        target: &RealmId,
        message_type: MessageType,
        mut payload: Map<String, Value>,
    ) -> DiplomacyResult<Initiated> {
        if message_type.is_response() {
            return Err(CodecError::MissingReference(message_type).into());
        }
        self.ensure_not_blocked(target)?;

        match message_type {
            MessageType::Greeting => {
                self.tracker.get_or_create(self.realm(), target);
                let greeting = GreetingPayload {
                    intent: ESTABLISH_COMMUNICATION.to_string(),
                    authority_level: self.authority().await,
                    verification_required: true,
                    message: None,
                };
                let mut body = match serde_json::to_value(&greeting) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                body.extend(payload);
                let mut envelope = self.envelope(message_type, target, &body, None)?;
                if self.config.compose_messages && !envelope.payload.contains_key("message") {
                    if let Some(text) = self.compose(&envelope).await {
                        envelope.payload.insert("message".into(), Value::String(text));
                    }
                }
                info!(realm = %self.realm(), target = %target, "Greeting sent");
                Ok(Initiated {
                    envelope: Some(envelope),
                    session_id: None,
                })
            }
            MessageType::TradeProposal | MessageType::AllianceRequest => {
                let topic = topic_of(message_type).ok_or_else(|| format_error("proposal"))?;
                payload.remove("session_id");
                payload.remove("round");
                let terms: Terms = serde_json::from_value(Value::Object(payload))
                    .map_err(|_| format_error("proposal"))?;

                let opened =
                    self.sessions
                        .open(self.realm(), target, topic, terms.clone(), now_millis())?;
                if let Some(t) = &opened.expired {
                    self.record(t).await;
                }
                let id = opened.session.id;
                if !opened.created {
                    info!(session_id = %id, "Proposal joined active session");
                    return Ok(Initiated {
                        envelope: None,
                        session_id: Some(id),
                    });
                }

                self.emit(DiplomacyEvent::SessionCreated {
                    realm: self.realm().clone(),
                    session_id: id,
                    initiator: self.realm().clone(),
                    counterparty: target.clone(),
                    topic,
                })
                .await;
                let body = TermsPayload {
                    session_id: id,
                    round: 1,
                    terms,
                };
                let envelope = self.envelope(message_type, target, &body, None)?;
                info!(session_id = %id, target = %target, topic = %topic, "Proposal sent");
                Ok(Initiated {
                    envelope: Some(envelope),
                    session_id: Some(id),
                })
            }
            _ => Ok(Initiated {
                envelope: Some(self.envelope(message_type, target, &payload, None)?),
                session_id: None,
            }),
        }
    }

    async fn command(
        &self,
        session_id: SessionId,
        command: SessionCommand,
    ) -> DiplomacyResult<Option<MessageEnvelope>> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| DiplomacyError::state(reasons::SESSION_NOT_FOUND))?;
        let peer = session
            .counterparty_of(self.realm())
            .cloned()
            .ok_or_else(|| DiplomacyError::state(reasons::SESSION_NOT_FOUND))?;
        self.ensure_not_blocked(&peer)?;
        let reference = self.reference_for(session_id);
        let now = now_millis();
        debug!(session_id = %session_id, command = command.name(), "Local decision");

        match command {
            SessionCommand::Accept => {
                let round = session.round;
                let t = self
                    .sessions
                    .advance(&session_id, &SessionEvent::Accept { round }, now)?;
                self.record(&t).await;
                if let Some(outcome) = &t.outcome {
                    return Ok(Some(self.rejection(&peer, Some(session_id), &outcome.reason, reference)?));
                }
                let mut ack = AckPayload::session(acks::ACCEPTED, session_id);
                ack.round = Some(round);
                Ok(Some(self.envelope(
                    MessageType::Acknowledgment,
                    &peer,
                    &ack,
                    Some(reference),
                )?))
            }
            SessionCommand::Counter { terms } => {
                let offer = CounterOffer {
                    from: self.realm().clone(),
                    round: session.round + 1,
                    timestamp: now,
                    terms: terms.clone(),
                };
                let round = offer.round;
                let t = self
                    .sessions
                    .advance(&session_id, &SessionEvent::Counter(offer), now)?;
                self.record(&t).await;
                if let Some(outcome) = &t.outcome {
                    if outcome.kind != OutcomeKind::Exhausted {
                        return Ok(Some(self.rejection(
                            &peer,
                            Some(session_id),
                            &outcome.reason,
                            reference,
                        )?));
                    }
                }
                // Sent even when it exhausts the session: the peer's machine
                // reaches the same verdict.
                let body = TermsPayload {
                    session_id,
                    round,
                    terms,
                };
                let mut envelope =
                    self.envelope(MessageType::CounterProposal, &peer, &body, Some(reference))?;
                // The peer ranks same-round counters by this timestamp.
                envelope.timestamp = i64::try_from(now).unwrap_or(i64::MAX);
                Ok(Some(envelope))
            }
            SessionCommand::Reject { reason } => {
                let reason = reason.unwrap_or_else(|| reasons::DECLINED.to_string());
                let t = self.sessions.advance(
                    &session_id,
                    &SessionEvent::Reject {
                        reason: Some(reason.clone()),
                    },
                    now,
                )?;
                self.record(&t).await;
                let reason = t
                    .outcome
                    .as_ref()
                    .map(|o| o.reason.clone())
                    .unwrap_or(reason);
                Ok(Some(self.rejection(&peer, Some(session_id), &reason, reference)?))
            }
        }
    }
}

#[async_trait]
impl DiplomacyApi for ProtocolAgent {
    async fn initiate(
        &self,
        target: &RealmId,
        message_type: MessageType,
        payload: Map<String, Value>,
    ) -> DiplomacyResult<Initiated> {
        match self.start(target, message_type, payload).await {
            Ok(initiated) => Ok(initiated),
            Err(err) => self.fail(None, err).await,
        }
    }

    async fn handle_incoming(
        &self,
        envelope: MessageEnvelope,
    ) -> DiplomacyResult<Vec<MessageEnvelope>> {
        match self.dispatch(&envelope).await {
            Ok(replies) => Ok(replies),
            Err(err) => {
                let session_id = envelope.payload_field::<SessionId>("session_id");
                self.fail(session_id, err).await
            }
        }
    }

    async fn advance_session(
        &self,
        session_id: SessionId,
        command: SessionCommand,
    ) -> DiplomacyResult<Option<MessageEnvelope>> {
        match self.command(session_id, command).await {
            Ok(reply) => Ok(reply),
            Err(err) => self.fail(Some(session_id), err).await,
        }
    }

    async fn cancel_session(
        &self,
        session_id: SessionId,
    ) -> DiplomacyResult<Option<MessageEnvelope>> {
        let reference = self.reference_for(session_id);
        let t = match self.sessions.cancel(&session_id, now_millis()) {
            Ok(t) => t,
            Err(err) => return self.fail(Some(session_id), err.into()).await,
        };
        if !t.applied {
            return Ok(None);
        }
        self.record(&t).await;
        info!(session_id = %session_id, "Session cancelled");

        let Some(peer) = self
            .sessions
            .get(&session_id)
            .and_then(|s| s.counterparty_of(self.realm()).cloned())
        else {
            return Ok(None);
        };
        let reason = t
            .outcome
            .as_ref()
            .map(|o| o.reason.clone())
            .unwrap_or_else(|| reasons::CANCELLED.to_string());
        Ok(Some(self.rejection(&peer, Some(session_id), &reason, reference)?))
    }

    fn session(&self, session_id: SessionId) -> Option<NegotiationSession> {
        self.sessions.get(&session_id)
    }

    fn relationship_with(&self, realm: &RealmId) -> RelationshipRecord {
        self.tracker.get_or_create(self.realm(), realm)
    }
}
