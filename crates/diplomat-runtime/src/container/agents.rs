//! # Agent Container
//!
//! Builds the shared components, then one [`ProtocolAgent`] per realm.
//!
//! ```text
//! InMemoryFactProvider ──→ VerificationGate ──┐
//! RelationshipTracker ────────────────────────┤
//! InMemoryEventBus ───────────────────────────┼──→ ProtocolAgent (per realm)
//! ScriptedReasoner ───────────────────────────┤
//! SimulatedExecutor (settles on the facts) ───┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use dp_02_verification_gate::{InMemoryFactProvider, VerificationGate};
use dp_03_relationship_tracker::RelationshipTracker;
use dp_05_protocol_agent::{ProtocolAgent, ScriptedReasoner, SimulatedExecutor};
use shared_bus::InMemoryEventBus;
use shared_types::RealmId;
use tracing::info;

use crate::container::config::RuntimeConfig;
use crate::container::seed::seed_facts;

/// Shared components plus the agents built on them.
pub struct AgentContainer {
    /// Configuration the container was built from.
    pub config: RuntimeConfig,
    /// Fact source, also settled by the executor.
    pub facts: Arc<InMemoryFactProvider>,
    /// Relationship store shared by every agent.
    pub tracker: Arc<RelationshipTracker>,
    /// Lifecycle events of every agent.
    pub bus: Arc<InMemoryEventBus>,
    /// Reasoning engine stand-in.
    pub reasoner: Arc<ScriptedReasoner>,
    /// Execution collaborator stand-in.
    pub executor: Arc<SimulatedExecutor>,
    agents: BTreeMap<RealmId, Arc<ProtocolAgent>>,
}

impl AgentContainer {
    /// Build every component. `config` is expected to be validated.
    pub fn new(config: RuntimeConfig) -> Self {
        let facts = Arc::new(seed_facts(&config.realms));
        let tracker = Arc::new(RelationshipTracker::new(config.tracker.clone()));
        let bus = Arc::new(InMemoryEventBus::new());
        let reasoner = Arc::new(ScriptedReasoner::new());
        let executor = Arc::new(SimulatedExecutor::settling(Arc::clone(&facts)));

        let agents = config
            .realms
            .iter()
            .map(|realm| {
                let agent = ProtocolAgent::new(
                    config.agent_config(realm),
                    VerificationGate::new(facts.clone()),
                    Arc::clone(&tracker),
                    Arc::clone(&bus),
                    reasoner.clone(),
                    executor.clone(),
                );
                (realm.clone(), Arc::new(agent))
            })
            .collect::<BTreeMap<_, _>>();
        info!(agents = agents.len(), "Protocol agents initialized");

        Self {
            config,
            facts,
            tracker,
            bus,
            reasoner,
            executor,
            agents,
        }
    }

    /// Agent speaking for `realm`.
    pub fn agent(&self, realm: &RealmId) -> Option<Arc<ProtocolAgent>> {
        self.agents.get(realm).cloned()
    }

    /// Every agent, ordered by realm.
    pub fn agents(&self) -> impl Iterator<Item = &Arc<ProtocolAgent>> {
        self.agents.values()
    }
}
