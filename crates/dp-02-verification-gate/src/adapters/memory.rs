//! # In-Memory Fact Provider
//!
//! Mutable fact store standing in for the on-chain indexer. Balances can be
//! changed between queries, which is exactly why the gate never caches them.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{RealmId, ResourceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

use crate::domain::{EntityId, FactError, OrderRecord, RealmInfo, ResourceBalance};
use crate::ports::FactProvider;

/// Fact source backed by in-process maps.
#[derive(Default)]
pub struct InMemoryFactProvider {
    realms: RwLock<HashMap<RealmId, RealmInfo>>,
    balances: RwLock<HashMap<EntityId, HashMap<ResourceId, u64>>>,
    orders: RwLock<Vec<OrderRecord>>,
    latency: RwLock<Option<Duration>>,
    unavailable: AtomicBool,
    queries: AtomicU64,
}

impl InMemoryFactProvider {
    /// Empty fact store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_realm`](Self::insert_realm).
    pub fn with_realm(self, info: RealmInfo) -> Self {
        self.insert_realm(info);
        self
    }

    /// Builder form of [`set_balance`](Self::set_balance).
    pub fn with_balance(self, entity: EntityId, resource: ResourceId, amount: u64) -> Self {
        self.set_balance(entity, resource, amount);
        self
    }

    /// Register or replace a realm's facts.
    pub fn insert_realm(&self, info: RealmInfo) {
        self.balances.write().entry(info.entity_id).or_default();
        self.realms.write().insert(info.realm_id.clone(), info);
    }

    /// Change a realm's level.
    pub fn set_level(&self, realm: &RealmId, level: u8) -> Result<(), FactError> {
        let mut realms = self.realms.write();
        let info = realms
            .get_mut(realm)
            .ok_or_else(|| FactError::UnknownRealm(realm.clone()))?;
        info.level = level;
        Ok(())
    }

    /// Overwrite one balance.
    pub fn set_balance(&self, entity: EntityId, resource: ResourceId, amount: u64) {
        self.balances
            .write()
            .entry(entity)
            .or_default()
            .insert(resource, amount);
    }

    /// Subtract from a balance, saturating at zero. Returns the new balance.
    pub fn debit(&self, entity: EntityId, resource: ResourceId, amount: u64) -> u64 {
        let mut balances = self.balances.write();
        let slot = balances.entry(entity).or_default().entry(resource).or_insert(0);
        *slot = slot.saturating_sub(amount);
        *slot
    }

    /// Add to a balance. Returns the new balance.
    pub fn credit(&self, entity: EntityId, resource: ResourceId, amount: u64) -> u64 {
        let mut balances = self.balances.write();
        let slot = balances.entry(entity).or_default().entry(resource).or_insert(0);
        *slot = slot.saturating_add(amount);
        *slot
    }

    /// Record an open order, replacing any with the same `trade_id`.
    pub fn add_order(&self, order: OrderRecord) {
        let mut orders = self.orders.write();
        orders.retain(|o| o.trade_id != order.trade_id);
        orders.push(order);
    }

    /// Close an open order. Returns it if it was open.
    pub fn remove_order(&self, trade_id: u64) -> Option<OrderRecord> {
        let mut orders = self.orders.write();
        let index = orders.iter().position(|o| o.trade_id == trade_id)?;
        Some(orders.remove(index))
    }

    /// Delay every query by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Make every query fail with [`FactError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of queries answered or refused so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    async fn before_query(&self, what: &'static str) -> Result<(), FactError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FactError::Unavailable(format!("{what} query refused")));
        }
        trace!(query = what, "Fact query");
        Ok(())
    }
}

#[async_trait]
impl FactProvider for InMemoryFactProvider {
    async fn realm_info(&self, realm: &RealmId) -> Result<RealmInfo, FactError> {
        self.before_query("realm_info").await?;
        self.realms
            .read()
            .get(realm)
            .cloned()
            .ok_or_else(|| FactError::UnknownRealm(realm.clone()))
    }

    async fn resource_balances(
        &self,
        entity: EntityId,
    ) -> Result<Vec<ResourceBalance>, FactError> {
        self.before_query("resource_balances").await?;
        let balances = self.balances.read();
        let held = balances
            .get(&entity)
            .ok_or(FactError::UnknownEntity(entity))?;
        let mut out: Vec<ResourceBalance> = held
            .iter()
            .map(|(&resource, &balance)| ResourceBalance { resource, balance })
            .collect();
        out.sort_by_key(|b| b.resource);
        Ok(out)
    }

    async fn open_orders(&self) -> Result<Vec<OrderRecord>, FactError> {
        self.before_query("open_orders").await?;
        Ok(self.orders.read().clone())
    }
}
