//! # Simulated Executor
//!
//! Execution collaborator that settles `create_order` and `accept_order`
//! calls against an [`InMemoryFactProvider`], or just records requests when
//! none is attached.
//!
//! Commits are keyed by session: once a session has settled, any further
//! request for it is refused with `DUPLICATE_COMMIT`.

use async_trait::async_trait;
use dp_02_verification_gate::{EntityId, FactProvider, InMemoryFactProvider};
use parking_lot::{Mutex, RwLock};
use shared_types::{ResourceAmount, SessionId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{AcceptCall, CommitReceipt, ExecutionError, ExecutionRequest, OrderCall};

/// Reason given when a session commits a second time.
pub const DUPLICATE_COMMIT: &str = "DUPLICATE_COMMIT";
use crate::ports::ExecutionCollaborator;

/// In-process [`ExecutionCollaborator`].
#[derive(Default)]
pub struct SimulatedExecutor {
    facts: Option<Arc<InMemoryFactProvider>>,
    submitted: Mutex<Vec<ExecutionRequest>>,
    settled: Mutex<HashSet<SessionId>>,
    failure: RwLock<Option<ExecutionError>>,
    latency: RwLock<Option<Duration>>,
    calls: AtomicU64,
    next_trade_id: AtomicU64,
}

impl SimulatedExecutor {
    /// Executor that only records requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that moves balances on `facts` when an order commits.
    pub fn settling(facts: Arc<InMemoryFactProvider>) -> Self {
        Self {
            facts: Some(facts),
            ..Self::default()
        }
    }

    /// Fail every commit with `failure` until cleared.
    pub fn set_failure(&self, failure: Option<ExecutionError>) {
        *self.failure.write() = failure;
    }

    /// Delay every commit by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of `commit` calls started, including abandoned ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn submitted(&self) -> Vec<ExecutionRequest> {
        self.submitted.lock().clone()
    }

    /// Sessions that settled, whatever their request.
    pub fn settled_count(&self) -> usize {
        self.settled.lock().len()
    }

    async fn apply(&self, request: &ExecutionRequest) -> Result<Option<u64>, ExecutionError> {
        if let Some(order) = request.order() {
            if let Some(facts) = &self.facts {
                settle(facts, &order).await?;
            }
            return Ok(Some(self.next_trade_id.fetch_add(1, Ordering::SeqCst) + 1));
        }
        if let Some(take) = request.acceptance() {
            if let Some(facts) = &self.facts {
                take_order(facts, &take).await?;
            }
            return Ok(Some(take.trade_id));
        }
        Ok(None)
    }
}

/// Swap both sides of `order`, reverting if either cannot pay.
async fn settle(facts: &InMemoryFactProvider, order: &OrderCall) -> Result<(), ExecutionError> {
    ensure_holds(facts, order.maker_id, &order.maker_gives).await?;
    ensure_holds(facts, order.taker_id, &order.taker_gives).await?;

    for r in &order.maker_gives {
        facts.debit(order.maker_id, r.resource, r.amount);
        facts.credit(order.taker_id, r.resource, r.amount);
    }
    for r in &order.taker_gives {
        facts.debit(order.taker_id, r.resource, r.amount);
        facts.credit(order.maker_id, r.resource, r.amount);
    }
    Ok(())
}

/// Settle an open order against its taker and close it.
async fn take_order(facts: &InMemoryFactProvider, take: &AcceptCall) -> Result<(), ExecutionError> {
    let order = facts
        .open_orders()
        .await
        .map_err(|e| ExecutionError::Unavailable(e.to_string()))?
        .into_iter()
        .find(|o| o.trade_id == take.trade_id && o.open_to(take.taker_id))
        .ok_or_else(|| ExecutionError::Reverted("ORDER_NOT_FOUND".into()))?;

    settle(
        facts,
        &OrderCall {
            maker_id: order.maker_id,
            maker_gives: take.maker_gives.clone(),
            taker_id: take.taker_id,
            taker_gives: take.taker_gives.clone(),
            expires_at: order.expires_at,
        },
    )
    .await?;
    facts.remove_order(take.trade_id);
    Ok(())
}

async fn ensure_holds(
    facts: &InMemoryFactProvider,
    entity: EntityId,
    gives: &[ResourceAmount],
) -> Result<(), ExecutionError> {
    if gives.is_empty() {
        return Ok(());
    }
    let held: HashMap<_, _> = facts
        .resource_balances(entity)
        .await
        .map_err(|e| ExecutionError::Unavailable(e.to_string()))?
        .into_iter()
        .map(|b| (b.resource, b.balance))
        .collect();
    for r in gives {
        if held.get(&r.resource).copied().unwrap_or(0) < r.amount {
            return Err(ExecutionError::Reverted("INSUFFICIENT_BALANCE".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl ExecutionCollaborator for SimulatedExecutor {
    async fn commit(&self, request: ExecutionRequest) -> Result<CommitReceipt, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        self.submitted.lock().push(request.clone());

        let failure = self.failure.read().clone();
        if let Some(err) = failure {
            debug!(session_id = %request.session_id, error = %err, "Simulated commit failure");
            return Err(err);
        }

        if !self.settled.lock().insert(request.session_id) {
            warn!(session_id = %request.session_id, "Repeated commit refused");
            return Err(ExecutionError::Rejected(DUPLICATE_COMMIT.into()));
        }
        let trade_id = match self.apply(&request).await {
            Ok(trade_id) => trade_id,
            Err(err) => {
                self.settled.lock().remove(&request.session_id);
                return Err(err);
            }
        };

        let receipt = CommitReceipt {
            transaction_hash: format!("0x{}", Uuid::new_v4().simple()),
            trade_id,
        };
        info!(
            session_id = %request.session_id,
            entrypoint = %request.entrypoint,
            tx = %receipt.transaction_hash,
            "Commit confirmed"
        );
        Ok(receipt)
    }
}
