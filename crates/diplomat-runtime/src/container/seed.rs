//! # World Seed
//!
//! Realm levels, entities and balances the in-memory fact source starts with.

use dp_02_verification_gate::{EntityId, InMemoryFactProvider, RealmInfo};
use shared_types::{resources, RealmId, ResourceAmount};
use tracing::{debug, info};

/// Starting facts for one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmSeed {
    /// Realm.
    pub realm: RealmId,
    /// Entity owning the realm's resources.
    pub entity_id: EntityId,
    /// Numeric realm level.
    pub level: u8,
    /// Opening balances.
    pub balances: Vec<ResourceAmount>,
}

impl RealmSeed {
    /// Seed for `realm`. The two demo realms get fixed holdings; any other
    /// realm starts at level 1 with nothing, on an entity derived from its
    /// position in the realm list.
    pub fn for_realm(realm: &RealmId, index: usize) -> Self {
        let (entity_id, level, balances) = match realm.as_str() {
            "6933" => (
                101,
                3,
                vec![
                    ResourceAmount::new(resources::WOOD, 1_000),
                    ResourceAmount::new(resources::STONE, 800),
                    ResourceAmount::new(resources::COAL, 500),
                    ResourceAmount::new(resources::COPPER, 300),
                    ResourceAmount::new(resources::GOLD, 100),
                ],
            ),
            "7777" => (
                202,
                5,
                vec![
                    ResourceAmount::new(resources::WOOD, 2_000),
                    ResourceAmount::new(resources::STONE, 1_500),
                    ResourceAmount::new(resources::SILVER, 750),
                    ResourceAmount::new(resources::IRONWOOD, 400),
                ],
            ),
            _ => (1_000 + index as EntityId, 1, Vec::new()),
        };
        Self {
            realm: realm.clone(),
            entity_id,
            level,
            balances,
        }
    }
}

/// Build a fact source holding a seed for every realm.
pub fn seed_facts(realms: &[RealmId]) -> InMemoryFactProvider {
    let facts = InMemoryFactProvider::new();
    for (index, realm) in realms.iter().enumerate() {
        let seed = RealmSeed::for_realm(realm, index);
        debug!(
            realm = %seed.realm,
            entity_id = seed.entity_id,
            level = seed.level,
            resources = seed.balances.len(),
            "Seeding realm"
        );
        facts.insert_realm(RealmInfo::new(seed.realm.clone(), seed.entity_id, seed.level));
        for b in &seed.balances {
            facts.set_balance(seed.entity_id, b.resource, b.amount);
        }
    }
    info!(realms = realms.len(), "Fact source seeded");
    facts
}
