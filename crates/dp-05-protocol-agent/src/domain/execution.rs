//! # Execution Requests
//!
//! Structured commit requests handed to the execution collaborator.
//!
//! ## `create_order` calldata
//!
//! ```text
//! [maker_id, n, (resource, amount) * n, taker_id, m, (resource, amount) * m, expires_at]
//! ```
//!
//! `expires_at` is in seconds.
//!
//! ## `accept_order` calldata
//!
//! ```text
//! [taker_id, trade_id, n, (resource, amount) * n, m, (resource, amount) * m]
//! ```
//!
//! The first list is what the maker gives, the second what the taker gives.

use dp_02_verification_gate::EntityId;
use serde::{Deserialize, Serialize};
use shared_types::{ResourceAmount, ResourceId, SessionId};

/// Trade systems contract used when no other address is configured.
pub const TRADE_SYSTEMS_ADDRESS: &str =
    "0x1234567890ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890ABCDEF";

/// Contract entrypoints the agent calls.
pub mod entrypoints {
    /// Open a resource trade order.
    pub const CREATE_ORDER: &str = "create_order";
    /// Take an open trade order.
    pub const ACCEPT_ORDER: &str = "accept_order";
    /// Record an alliance between two entities.
    pub const FORM_ALLIANCE: &str = "form_alliance";
}

/// One contract call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Session being committed.
    pub session_id: SessionId,
    /// Target contract.
    pub contract_address: String,
    /// Entrypoint name.
    pub entrypoint: String,
    /// Flat parameter list.
    pub calldata: Vec<u64>,
}

impl ExecutionRequest {
    /// `create_order` call: `maker` gives `maker_gives`, `taker` gives
    /// `taker_gives`.
    pub fn create_order(
        contract_address: &str,
        session_id: SessionId,
        order: &OrderCall,
    ) -> Self {
        let mut calldata = Vec::with_capacity(
            5 + 2 * (order.maker_gives.len() + order.taker_gives.len()),
        );
        calldata.push(order.maker_id);
        push_resources(&mut calldata, &order.maker_gives);
        calldata.push(order.taker_id);
        push_resources(&mut calldata, &order.taker_gives);
        calldata.push(order.expires_at);

        Self {
            session_id,
            contract_address: contract_address.to_string(),
            entrypoint: entrypoints::CREATE_ORDER.to_string(),
            calldata,
        }
    }

    /// `accept_order` call: `taker` takes open order `trade_id`.
    pub fn accept_order(contract_address: &str, session_id: SessionId, take: &AcceptCall) -> Self {
        let mut calldata =
            Vec::with_capacity(4 + 2 * (take.maker_gives.len() + take.taker_gives.len()));
        calldata.push(take.taker_id);
        calldata.push(take.trade_id);
        push_resources(&mut calldata, &take.maker_gives);
        push_resources(&mut calldata, &take.taker_gives);

        Self {
            session_id,
            contract_address: contract_address.to_string(),
            entrypoint: entrypoints::ACCEPT_ORDER.to_string(),
            calldata,
        }
    }

    /// `form_alliance` call between two entities.
    pub fn form_alliance(
        contract_address: &str,
        session_id: SessionId,
        a: EntityId,
        b: EntityId,
    ) -> Self {
        Self {
            session_id,
            contract_address: contract_address.to_string(),
            entrypoint: entrypoints::FORM_ALLIANCE.to_string(),
            calldata: vec![a, b],
        }
    }

    /// Decode the order back out of `create_order` calldata.
    pub fn order(&self) -> Option<OrderCall> {
        if self.entrypoint != entrypoints::CREATE_ORDER {
            return None;
        }
        OrderCall::parse(&self.calldata)
    }

    /// Decode `accept_order` calldata.
    pub fn acceptance(&self) -> Option<AcceptCall> {
        if self.entrypoint != entrypoints::ACCEPT_ORDER {
            return None;
        }
        AcceptCall::parse(&self.calldata)
    }
}

fn push_resources(calldata: &mut Vec<u64>, resources: &[ResourceAmount]) {
    calldata.push(resources.len() as u64);
    for r in resources {
        calldata.push(u64::from(r.resource));
        calldata.push(r.amount);
    }
}

/// Parameters of a `create_order` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderCall {
    /// Entity that opens the order.
    pub maker_id: EntityId,
    /// What the maker gives.
    pub maker_gives: Vec<ResourceAmount>,
    /// Counterparty entity.
    pub taker_id: EntityId,
    /// What the taker gives.
    pub taker_gives: Vec<ResourceAmount>,
    /// Order expiry, seconds.
    pub expires_at: u64,
}

impl OrderCall {
    /// Parse flat calldata. Returns `None` on any length mismatch.
    pub fn parse(calldata: &[u64]) -> Option<Self> {
        let mut it = calldata.iter().copied();
        let maker_id = it.next()?;
        let maker_gives = take_resources(&mut it)?;
        let taker_id = it.next()?;
        let taker_gives = take_resources(&mut it)?;
        let expires_at = it.next()?;
        if it.next().is_some() {
            return None;
        }
        Some(Self {
            maker_id,
            maker_gives,
            taker_id,
            taker_gives,
            expires_at,
        })
    }
}

/// Parameters of an `accept_order` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptCall {
    /// Entity taking the order.
    pub taker_id: EntityId,
    /// Order being taken.
    pub trade_id: u64,
    /// What the maker gives.
    pub maker_gives: Vec<ResourceAmount>,
    /// What the taker gives.
    pub taker_gives: Vec<ResourceAmount>,
}

impl AcceptCall {
    /// Parse flat calldata. Returns `None` on any length mismatch.
    pub fn parse(calldata: &[u64]) -> Option<Self> {
        let mut it = calldata.iter().copied();
        let taker_id = it.next()?;
        let trade_id = it.next()?;
        let maker_gives = take_resources(&mut it)?;
        let taker_gives = take_resources(&mut it)?;
        if it.next().is_some() {
            return None;
        }
        Some(Self {
            taker_id,
            trade_id,
            maker_gives,
            taker_gives,
        })
    }
}

fn take_resources(it: &mut impl Iterator<Item = u64>) -> Option<Vec<ResourceAmount>> {
    let n = it.next()?;
    let mut out = Vec::new();
    for _ in 0..n {
        let resource = ResourceId::try_from(it.next()?).ok()?;
        let amount = it.next()?;
        out.push(ResourceAmount::new(resource, amount));
    }
    Some(out)
}

/// Confirmation returned by the execution collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Transaction reference.
    pub transaction_hash: String,
    /// Order id assigned by the contract, for trades.
    pub trade_id: Option<u64>,
}
