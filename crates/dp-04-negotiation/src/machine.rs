//! # Transition Function
//!
//! The only code that mutates a [`NegotiationSession`].
//!
//! ## Transition Table
//!
//! | From | Event | To |
//! |------|-------|----|
//! | VERIFICATION | verify ok | NEGOTIATION |
//! | VERIFICATION | verify fail | REJECTED |
//! | NEGOTIATION | accept | EXECUTION |
//! | NEGOTIATION | counter | NEGOTIATION (round + 1) |
//! | NEGOTIATION | counter past `max_rounds` | REJECTED (`NEGOTIATION_EXHAUSTED`) |
//! | NEGOTIATION | reject | REJECTED |
//! | EXECUTION | commit ok | ACCEPTED |
//! | EXECUTION | commit fail | FAILED |
//! | any non-terminal | deadline passed | FAILED (`EXPIRED`) |
//! | any non-terminal | cancel | FAILED (`CANCELLED`) |
//! | VERIFICATION, NEGOTIATION | timeout exhausted | FAILED (`TIMEOUT`) |
//! | EXECUTION | timeout exhausted | FAILED (commit fail, `TIMEOUT`) |
//! | any non-terminal | abort | FAILED (`INTERNAL`) |
//!
//! Rejected attempts leave the session untouched.

use shared_types::{reasons, OutcomeKind, SessionPhase, Timestamp};
use std::cmp::Ordering;

use crate::domain::{
    compare_counters, CounterOffer, NegotiationConfig, NegotiationError, NegotiationSession,
    SessionEvent, Transition,
};

impl NegotiationSession {
    /// Apply `event` at time `now`.
    ///
    /// Expiry is checked first: once `now >= expires_at` any event closes
    /// the session as FAILED(`EXPIRED`). Cancelling a closed session is a
    /// no-op; every other event on a closed session is invalid.
    pub fn apply(
        &mut self,
        event: &SessionEvent,
        now: Timestamp,
        config: &NegotiationConfig,
    ) -> Result<Transition, NegotiationError> {
        let from = self.phase;

        if self.is_terminal() {
            return match event {
                SessionEvent::Cancel => Ok(self.transition(from, false)),
                _ => Err(self.invalid(event)),
            };
        }

        if self.is_expired(now) {
            self.close(OutcomeKind::Expired, reasons::EXPIRED.to_string(), now);
            return Ok(self.transition(from, true));
        }

        use SessionPhase::*;
        match (from, event) {
            (Verification, SessionEvent::VerifyOk) => self.phase = Negotiation,
            (Verification, SessionEvent::VerifyFail { reason }) => {
                self.close(OutcomeKind::VerificationFailed, reason.clone(), now)
            }
            (Negotiation, SessionEvent::Accept { round }) => {
                if *round < self.round {
                    return Err(NegotiationError::StaleMessage {
                        current: self.round,
                        got: *round,
                    });
                }
                if *round > self.round {
                    return Err(self.invalid(event));
                }
                self.phase = Execution;
            }
            (Negotiation, SessionEvent::Counter(counter)) => {
                return self.apply_counter(counter, now, config)
            }
            (Negotiation, SessionEvent::Reject { reason }) => {
                let reason = reason
                    .clone()
                    .unwrap_or_else(|| reasons::DECLINED.to_string());
                self.close(OutcomeKind::Declined, reason, now);
            }
            (Execution, SessionEvent::CommitOk) => self.close(
                OutcomeKind::Completed,
                OutcomeKind::Completed.default_reason().to_string(),
                now,
            ),
            (Execution, SessionEvent::CommitFail { reason }) => {
                self.close(OutcomeKind::ExecutionFailed, reason.clone(), now)
            }
            (_, SessionEvent::Cancel) => {
                self.close(OutcomeKind::Cancelled, reasons::CANCELLED.to_string(), now)
            }
            (Verification | Negotiation, SessionEvent::TimeoutExhausted) => {
                self.close(OutcomeKind::TimedOut, reasons::TIMEOUT.to_string(), now)
            }
            (Execution, SessionEvent::TimeoutExhausted) => {
                self.close(OutcomeKind::ExecutionFailed, reasons::TIMEOUT.to_string(), now)
            }
            (_, SessionEvent::Abort { reason }) => {
                self.close(OutcomeKind::Internal, reason.clone(), now)
            }
            _ => return Err(self.invalid(event)),
        }

        Ok(self.transition(from, true))
    }

    fn apply_counter(
        &mut self,
        counter: &CounterOffer,
        now: Timestamp,
        config: &NegotiationConfig,
    ) -> Result<Transition, NegotiationError> {
        let from = self.phase;

        if counter.round == self.round {
            // Concurrent counter for the round already settled: the tie-break
            // decides which terms stand.
            let Some(incumbent) = self.last_counter.as_ref().filter(|c| c.round == self.round)
            else {
                return Err(NegotiationError::StaleMessage {
                    current: self.round,
                    got: counter.round,
                });
            };
            let wins = compare_counters(counter, incumbent) == Ordering::Greater;
            if wins {
                self.take_counter(counter);
            }
            return Ok(self.transition(from, wins));
        }

        if counter.round < self.round {
            return Err(NegotiationError::StaleMessage {
                current: self.round,
                got: counter.round,
            });
        }

        if counter.round > self.round + 1 {
            return Err(NegotiationError::InvalidTransition {
                phase: from,
                event: "counter",
            });
        }

        if counter.round > config.max_rounds {
            self.close(
                OutcomeKind::Exhausted,
                reasons::NEGOTIATION_EXHAUSTED.to_string(),
                now,
            );
        } else {
            self.round = counter.round;
            self.take_counter(counter);
        }
        Ok(self.transition(from, true))
    }

    fn take_counter(&mut self, counter: &CounterOffer) {
        self.proposed_terms = counter.terms.clone();
        self.counter_terms = Some(counter.terms.clone());
        self.last_counter = Some(counter.clone());
    }

    fn invalid(&self, event: &SessionEvent) -> NegotiationError {
        NegotiationError::InvalidTransition {
            phase: self.phase,
            event: event.name(),
        }
    }

    fn transition(&self, from: SessionPhase, applied: bool) -> Transition {
        Transition {
            session_id: self.id,
            from,
            to: self.phase,
            round: self.round,
            applied,
            outcome: if applied && self.is_terminal() {
                self.outcome.clone()
            } else {
                None
            },
        }
    }
}
