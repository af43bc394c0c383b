//! # Value Objects
//!
//! Terms, counter-offers and session configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{total_units, RealmId, ResourceAmount, Timestamp};

/// What one side gives and asks for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    /// Resources the proposer gives.
    #[serde(default)]
    pub offer: Vec<ResourceAmount>,
    /// Resources the proposer asks for.
    #[serde(default)]
    pub request: Vec<ResourceAmount>,
    /// Open order the proposer wants to take instead of opening a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<u64>,
    /// Fields this version does not interpret, carried along unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Terms {
    /// Terms with no extra fields.
    pub fn new(offer: Vec<ResourceAmount>, request: Vec<ResourceAmount>) -> Self {
        Self {
            offer,
            request,
            trade_id: None,
            extra: Map::new(),
        }
    }

    /// Terms for taking open order `trade_id`.
    pub fn taking(trade_id: u64, offer: Vec<ResourceAmount>, request: Vec<ResourceAmount>) -> Self {
        Self {
            trade_id: Some(trade_id),
            ..Self::new(offer, request)
        }
    }

    /// Total units offered plus requested.
    pub fn volume(&self) -> u64 {
        total_units(&self.offer).saturating_add(total_units(&self.request))
    }
}

/// A counter-proposal as received by the state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterOffer {
    /// Realm that sent the counter.
    pub from: RealmId,
    /// Round the counter proposes.
    pub round: u32,
    /// Sender's timestamp, used for tie-breaks.
    pub timestamp: Timestamp,
    /// Replacement terms.
    pub terms: Terms,
}

/// Negotiation session configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Highest round a session may reach. The counter that would go past it
    /// exhausts the session.
    pub max_rounds: u32,
    /// Session lifetime in milliseconds.
    pub session_ttl_ms: u64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            session_ttl_ms: 5 * 60 * 1000,
        }
    }
}
