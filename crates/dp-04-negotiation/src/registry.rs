//! # Session Registry
//!
//! Concurrent store of negotiation sessions.
//!
//! - One active session per ordered `(realm_a, realm_b, topic)`; a second
//!   proposal on the same triple gets the existing session back.
//! - One in-flight transition per session. A caller holds a
//!   [`SessionLease`] for the whole (possibly async) transition; anyone else
//!   asking for the same session meanwhile gets `SESSION_BUSY`. Calls are
//!   rejected, not queued.

use parking_lot::{Mutex, RwLock};
use shared_types::{RealmId, SessionId, Timestamp, Topic};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{
    NegotiationConfig, NegotiationError, NegotiationSession, SessionEvent, Terms, Transition,
};

type Triple = (RealmId, RealmId, Topic);

struct SessionSlot {
    session: Mutex<NegotiationSession>,
    busy: AtomicBool,
}

struct Inner {
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
    active: RwLock<HashMap<Triple, SessionId>>,
    config: NegotiationConfig,
}

impl Inner {
    fn release_triple(&self, session: &NegotiationSession) {
        let triple = (session.realm_a.clone(), session.realm_b.clone(), session.topic);
        let mut active = self.active.write();
        if active.get(&triple) == Some(&session.id) {
            active.remove(&triple);
        }
    }

    fn record(&self, session: &NegotiationSession, event: &str, transition: &Transition) {
        if transition.closed() {
            self.release_triple(session);
            info!(
                session_id = %session.id,
                event,
                phase = %transition.to,
                reason = session.outcome.as_ref().map(|o| o.reason.as_str()).unwrap_or(""),
                "Session closed"
            );
        } else if transition.applied {
            debug!(
                session_id = %session.id,
                event,
                from = %transition.from,
                to = %transition.to,
                round = transition.round,
                "Session advanced"
            );
        }
    }
}

/// Result of [`SessionRegistry::open`].
#[derive(Clone, Debug)]
pub struct Opened {
    /// The session now active for the triple.
    pub session: NegotiationSession,
    /// `false` if an existing active session was returned.
    pub created: bool,
    /// A previous session on the triple that was found expired and closed.
    pub expired: Option<Transition>,
}

/// Exclusive right to transition one session.
///
/// Released on drop.
pub struct SessionLease {
    inner: Arc<Inner>,
    slot: Arc<SessionSlot>,
}

impl SessionLease {
    /// Current state of the leased session.
    pub fn session(&self) -> NegotiationSession {
        self.slot.session.lock().clone()
    }

    /// Apply one event through the transition function.
    pub fn apply(
        &self,
        event: &SessionEvent,
        now: Timestamp,
    ) -> Result<Transition, NegotiationError> {
        let (transition, snapshot) = {
            let mut session = self.slot.session.lock();
            let transition = session.apply(event, now, &self.inner.config)?;
            (transition, session.clone())
        };
        // Session lock released first: `open` takes the active map before it.
        self.inner.record(&snapshot, event.name(), &transition);
        Ok(transition)
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Sessions known to one agent.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(NegotiationConfig::default())
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(config: NegotiationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: RwLock::new(HashMap::new()),
                active: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &NegotiationConfig {
        &self.inner.config
    }

    /// Open a session with a fresh id.
    pub fn open(
        &self,
        realm_a: &RealmId,
        realm_b: &RealmId,
        topic: Topic,
        terms: Terms,
        now: Timestamp,
    ) -> Result<Opened, NegotiationError> {
        self.open_with_id(uuid::Uuid::new_v4(), realm_a, realm_b, topic, terms, now)
    }

    /// Open a session under an id chosen by the initiator.
    ///
    /// Returns the existing session if the triple already has a live one. An
    /// expired session on the triple is closed first and reported in
    /// [`Opened::expired`]. Reusing `id` for a different triple fails.
    pub fn open_with_id(
        &self,
        id: SessionId,
        realm_a: &RealmId,
        realm_b: &RealmId,
        topic: Topic,
        terms: Terms,
        now: Timestamp,
    ) -> Result<Opened, NegotiationError> {
        let triple: Triple = (realm_a.clone(), realm_b.clone(), topic);
        let mut active = self.inner.active.write();
        let mut expired = None;

        if let Some(existing_id) = active.get(&triple).copied() {
            if let Some(slot) = self.slot(&existing_id) {
                let mut existing = slot.session.lock();
                if !existing.is_terminal() && !existing.is_expired(now) {
                    debug!(session_id = %existing_id, "Proposal joined existing session");
                    return Ok(Opened {
                        session: existing.clone(),
                        created: false,
                        expired: None,
                    });
                }
                if !existing.is_terminal() && !slot.busy.load(Ordering::Acquire) {
                    let t = existing.apply(&SessionEvent::Expire, now, &self.inner.config)?;
                    info!(session_id = %existing_id, "Expired session closed on reopen");
                    expired = Some(t);
                }
            }
            active.remove(&triple);
        }

        let mut sessions = self.inner.sessions.write();
        if let Some(slot) = sessions.get(&id) {
            let existing = slot.session.lock();
            let same = existing.realm_a == *realm_a
                && existing.realm_b == *realm_b
                && existing.topic == topic;
            if !same {
                return Err(NegotiationError::IdConflict(id));
            }
            // A replayed proposal for a closed session does not reopen it.
            return Ok(Opened {
                session: existing.clone(),
                created: false,
                expired,
            });
        }

        let session = NegotiationSession::new(
            id,
            realm_a.clone(),
            realm_b.clone(),
            topic,
            terms,
            now,
            &self.inner.config,
        );
        sessions.insert(
            id,
            Arc::new(SessionSlot {
                session: Mutex::new(session.clone()),
                busy: AtomicBool::new(false),
            }),
        );
        active.insert(triple, id);

        info!(
            session_id = %id,
            realm_a = %realm_a,
            realm_b = %realm_b,
            topic = %topic,
            "Session opened"
        );
        Ok(Opened {
            session,
            created: true,
            expired,
        })
    }

    fn slot(&self, id: &SessionId) -> Option<Arc<SessionSlot>> {
        self.inner.sessions.read().get(id).cloned()
    }

    /// Snapshot of a session.
    pub fn get(&self, id: &SessionId) -> Option<NegotiationSession> {
        self.slot(id).map(|slot| slot.session.lock().clone())
    }

    /// Live session for a triple, if any.
    pub fn active_for(&self, realm_a: &RealmId, realm_b: &RealmId, topic: Topic) -> Option<SessionId> {
        self.inner
            .active
            .read()
            .get(&(realm_a.clone(), realm_b.clone(), topic))
            .copied()
    }

    /// Take the single-writer lease on a session.
    pub fn begin(&self, id: &SessionId) -> Result<SessionLease, NegotiationError> {
        let slot = self
            .slot(id)
            .ok_or(NegotiationError::SessionNotFound(*id))?;
        if slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(session_id = %id, "Session busy");
            return Err(NegotiationError::SessionBusy(*id));
        }
        Ok(SessionLease {
            inner: self.inner.clone(),
            slot,
        })
    }

    /// Apply one event under a short-lived lease.
    pub fn advance(
        &self,
        id: &SessionId,
        event: &SessionEvent,
        now: Timestamp,
    ) -> Result<Transition, NegotiationError> {
        self.begin(id)?.apply(event, now)
    }

    /// Cancel a session. Cancelling a closed session is a no-op.
    pub fn cancel(&self, id: &SessionId, now: Timestamp) -> Result<Transition, NegotiationError> {
        self.advance(id, &SessionEvent::Cancel, now)
    }

    /// Close every idle session whose deadline has passed.
    ///
    /// Sessions with a transition in flight are skipped; the next transition
    /// attempt on them expires them anyway.
    pub fn sweep_expired(&self, now: Timestamp) -> Vec<Transition> {
        let slots: Vec<(SessionId, Arc<SessionSlot>)> = self
            .inner
            .sessions
            .read()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, _) in slots {
            let Ok(lease) = self.begin(&id) else {
                continue;
            };
            let snapshot = lease.session();
            if snapshot.is_terminal() || !snapshot.is_expired(now) {
                continue;
            }
            if let Ok(t) = lease.apply(&SessionEvent::Expire, now) {
                closed.push(t);
            }
        }
        if !closed.is_empty() {
            info!(count = closed.len(), "Expired sessions swept");
        }
        closed
    }

    /// Drop closed sessions that ended before `before`. Returns how many were
    /// removed.
    pub fn purge_closed(&self, before: Timestamp) -> usize {
        let mut sessions = self.inner.sessions.write();
        let initial = sessions.len();
        sessions.retain(|_, slot| {
            let session = slot.session.lock();
            match &session.outcome {
                Some(outcome) => outcome.closed_at >= before,
                None => true,
            }
        });
        initial - sessions.len()
    }

    /// Number of sessions stored.
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Whether no session is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.read().is_empty()
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }
}
