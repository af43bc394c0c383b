//! # Test Fixtures
//!
//! A [`World`] holds one agent per realm over shared components and routes
//! envelopes between them until no replies remain.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dp_01_envelope_codec::{MessageEnvelope, MessageType};
use dp_02_verification_gate::{EntityId, InMemoryFactProvider, RealmInfo, VerificationGate};
use dp_03_relationship_tracker::{RelationshipRecord, RelationshipTracker, TrackerConfig};
use dp_04_negotiation::{NegotiationConfig, Terms};
use dp_05_protocol_agent::{
    AgentConfig, DiplomacyApi, ProtocolAgent, ScriptedReasoner, SessionCommand, SimulatedExecutor,
};
use serde_json::{json, Map, Value};
use shared_bus::InMemoryEventBus;
use shared_types::{resources, DiplomacyError, RealmId, SessionId, SessionPhase};

/// Realm with 6933's holdings: level 3, entity 101.
pub const A: &str = "6933";
/// Realm with 7777's holdings: level 5, entity 202.
pub const B: &str = "7777";
/// Level 2 realm with a small treasury, entity 303.
pub const C: &str = "1111";

/// Knobs shared by every agent in a world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Deadline per delegated call attempt.
    pub call_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Negotiation limits.
    pub negotiation: NegotiationConfig,
    /// Trust deltas and thresholds.
    pub tracker: TrackerConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(200),
            max_retries: 1,
            negotiation: NegotiationConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// Agents for [`A`], [`B`] and [`C`] over shared components.
pub struct World {
    /// Fact source, settled by the executor on commit.
    pub facts: Arc<InMemoryFactProvider>,
    /// Shared relationship store.
    pub tracker: Arc<RelationshipTracker>,
    /// Shared event bus.
    pub bus: Arc<InMemoryEventBus>,
    /// Reasoning engine stand-in.
    pub reasoner: Arc<ScriptedReasoner>,
    /// Execution collaborator stand-in.
    pub executor: Arc<SimulatedExecutor>,
    agents: BTreeMap<RealmId, Arc<ProtocolAgent>>,
}

impl World {
    /// World with default knobs.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// World with custom knobs.
    pub fn with_config(config: WorldConfig) -> Self {
        let seeds: [(&str, EntityId, u8); 3] = [(A, 101, 3), (B, 202, 5), (C, 303, 2)];
        let facts = InMemoryFactProvider::new()
            .with_balance(101, resources::WOOD, 1_000)
            .with_balance(101, resources::STONE, 800)
            .with_balance(101, resources::GOLD, 100)
            .with_balance(202, resources::SILVER, 750)
            .with_balance(202, resources::IRONWOOD, 400)
            .with_balance(303, resources::WOOD, 200_000)
            .with_balance(303, resources::WHEAT, 50);
        for (realm, entity, level) in seeds {
            facts.insert_realm(RealmInfo::new(realm, entity, level));
        }
        let facts = Arc::new(facts);
        let tracker = Arc::new(RelationshipTracker::new(config.tracker.clone()));
        let bus = Arc::new(InMemoryEventBus::new());
        let reasoner = Arc::new(ScriptedReasoner::new());
        let executor = Arc::new(SimulatedExecutor::settling(facts.clone()));

        let mut agents = BTreeMap::new();
        for (realm, _, _) in seeds {
            let mut agent_config = AgentConfig::new(realm);
            agent_config.call_timeout = config.call_timeout;
            agent_config.max_retries = config.max_retries;
            agent_config.negotiation = config.negotiation.clone();
            let agent = ProtocolAgent::new(
                agent_config,
                VerificationGate::new(facts.clone()),
                tracker.clone(),
                bus.clone(),
                reasoner.clone(),
                executor.clone(),
            );
            agents.insert(RealmId::from(realm), Arc::new(agent));
        }

        Self {
            facts,
            tracker,
            bus,
            reasoner,
            executor,
            agents,
        }
    }

    /// Agent for `realm`.
    ///
    /// # Panics
    ///
    /// If the world has no such realm.
    pub fn agent(&self, realm: &str) -> Arc<ProtocolAgent> {
        self.agents
            .get(&RealmId::from(realm))
            .cloned()
            .unwrap_or_else(|| panic!("no agent for realm {realm}"))
    }

    /// Deliver `first` and every reply it triggers. Returns the errors the
    /// receiving agents reported.
    pub async fn pump(&self, first: MessageEnvelope) -> Vec<DiplomacyError> {
        let mut queue = VecDeque::from([first]);
        let mut errors = Vec::new();
        while let Some(envelope) = queue.pop_front() {
            let Some(agent) = self.agents.get(&envelope.target_realm) else {
                continue;
            };
            match agent.handle_incoming(envelope).await {
                Ok(replies) => queue.extend(replies),
                Err(err) => errors.push(err),
            }
        }
        errors
    }

    /// `from` proposes a trade to `to` and the proposal is delivered.
    pub async fn propose(&self, from: &str, to: &str, wood: u64, silver: u64) -> SessionId {
        let initiated = self
            .agent(from)
            .initiate(&realm(to), MessageType::TradeProposal, trade(wood, silver))
            .await
            .unwrap();
        let id = initiated.session_id.unwrap();
        if let Some(envelope) = initiated.envelope {
            let errors = self.pump(envelope).await;
            assert!(errors.is_empty(), "{errors:?}");
        }
        id
    }

    /// `realm` runs `command` on `session` and the result is delivered.
    pub async fn decide(&self, realm: &str, session: SessionId, command: SessionCommand) {
        let reply = self
            .agent(realm)
            .advance_session(session, command)
            .await
            .unwrap();
        if let Some(envelope) = reply {
            self.pump(envelope).await;
        }
    }

    /// Phase of `session` as `realm` sees it.
    pub fn phase(&self, realm: &str, session: SessionId) -> SessionPhase {
        self.agent(realm).session(session).unwrap().phase
    }

    /// Relationship between two realms.
    pub fn relationship(&self, a: &str, b: &str) -> RelationshipRecord {
        self.tracker.get_or_create(&realm(a), &realm(b))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Realm id shorthand.
pub fn realm(id: &str) -> RealmId {
    RealmId::from(id)
}

/// Trade payload: the initiator gives `wood` WOOD for `silver` SILVER.
pub fn trade(wood: u64, silver: u64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(
        "offer".into(),
        json!([{"resource": resources::WOOD, "amount": wood}]),
    );
    payload.insert(
        "request".into(),
        json!([{"resource": resources::SILVER, "amount": silver}]),
    );
    payload
}

/// Terms matching [`trade`].
pub fn terms(wood: u64, silver: u64) -> Terms {
    serde_json::from_value(Value::Object(trade(wood, silver))).unwrap()
}
