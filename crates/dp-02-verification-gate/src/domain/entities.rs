//! # Domain Entities
//!
//! Point-in-time facts about realms and the verdicts the gate derives from
//! them. None of these are cached by the gate.

use serde::{Deserialize, Serialize};
use shared_types::{ActionType, AuthorityLevel, RealmId, ResourceAmount, ResourceId};

use super::errors::GateError;

/// On-chain entity identifier of a realm.
pub type EntityId = u64;

/// Identity and standing of a realm as reported by the fact source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmInfo {
    /// Realm identifier.
    pub realm_id: RealmId,
    /// Entity that owns the realm's resources.
    pub entity_id: EntityId,
    /// Numeric realm level.
    pub level: u8,
    /// Order (faction) the realm belongs to.
    pub order: u32,
}

impl RealmInfo {
    /// Create realm facts.
    pub fn new(realm_id: impl Into<RealmId>, entity_id: EntityId, level: u8) -> Self {
        Self {
            realm_id: realm_id.into(),
            entity_id,
            level,
            order: 0,
        }
    }

    /// Authority granted by the realm's level.
    pub fn authority(&self) -> AuthorityLevel {
        AuthorityLevel::from_realm_level(self.level)
    }
}

/// Balance of one resource type held by an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBalance {
    /// Resource type.
    pub resource: ResourceId,
    /// Units held.
    pub balance: u64,
}

/// An open trade order waiting for a taker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Id assigned by the settlement contract.
    pub trade_id: u64,
    /// Entity that opened the order.
    pub maker_id: EntityId,
    /// Entity allowed to take the order; `0` when anyone may.
    pub taker_id: EntityId,
    /// What the maker hands over.
    pub maker_gives: Vec<ResourceAmount>,
    /// What the taker must pay.
    pub taker_gives: Vec<ResourceAmount>,
    /// Expiry in seconds; `0` never expires.
    pub expires_at: u64,
}

impl OrderRecord {
    /// Whether `entity` may take this order.
    pub fn open_to(&self, entity: EntityId) -> bool {
        self.taker_id == 0 || self.taker_id == entity
    }

    /// Whether the order has lapsed at `now_secs`.
    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.expires_at != 0 && now_secs >= self.expires_at
    }
}

/// A realm asking to take an open order.
#[derive(Clone, Copy, Debug)]
pub struct OrderTake<'a> {
    /// Order to take.
    pub trade_id: u64,
    /// Realm expected to have opened it.
    pub maker: &'a RealmId,
    /// Realm taking it.
    pub taker: &'a RealmId,
    /// What the taker pays; must match the order's `taker_gives`.
    pub pays: &'a [ResourceAmount],
    /// What the taker receives; must match the order's `maker_gives`.
    pub receives: &'a [ResourceAmount],
}

/// Authority check passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Granted {
    /// Realm that was checked.
    pub realm: RealmId,
    /// Level the realm actually holds.
    pub level: AuthorityLevel,
}

/// Resource check passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Available {
    /// Realm that was checked.
    pub realm: RealmId,
    /// Requested amounts, aggregated per resource type.
    pub checked: Vec<ResourceAmount>,
}

/// One resource type the realm cannot cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShortfall {
    /// Resource type.
    pub resource: ResourceId,
    /// Units requested.
    pub requested: u64,
    /// Units held at query time.
    pub available: u64,
}

/// Combined result of the authority and resource checks for one proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    /// Realm whose standing was verified.
    pub subject: RealmId,
    /// Action requested.
    pub action: ActionType,
    /// Total resource units involved.
    pub volume: u64,
    /// Minimum level the action needs.
    pub required_level: AuthorityLevel,
    /// Level the realm holds, if the fact source knows it.
    pub granted_level: Option<AuthorityLevel>,
    /// First failed check, if any.
    pub failure: Option<GateError>,
}

impl VerificationReport {
    /// Both checks passed.
    pub fn is_granted(&self) -> bool {
        self.failure.is_none()
    }

    /// Machine-readable failure reason.
    pub fn reason(&self) -> Option<&'static str> {
        self.failure.as_ref().map(GateError::reason)
    }

    /// Turn the report into a plain result.
    pub fn into_result(self) -> Result<(), GateError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
