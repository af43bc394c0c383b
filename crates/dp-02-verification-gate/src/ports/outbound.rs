//! # Outbound Ports
//!
//! Read-only fact source. Every call is a point-in-time query; callers must
//! not assume the answer stays fresh.

use async_trait::async_trait;
use shared_types::RealmId;

use crate::domain::{EntityId, FactError, OrderRecord, RealmInfo, ResourceBalance};

/// Realm identity, balances and open orders - outbound port.
#[async_trait]
pub trait FactProvider: Send + Sync {
    /// Identity and level of a realm.
    async fn realm_info(&self, realm: &RealmId) -> Result<RealmInfo, FactError>;

    /// Current balances held by an entity.
    async fn resource_balances(&self, entity: EntityId)
        -> Result<Vec<ResourceBalance>, FactError>;

    /// Open order records.
    async fn open_orders(&self) -> Result<Vec<OrderRecord>, FactError>;
}
