//! # Core Domain Entities
//!
//! Identifiers and value types shared by every diplomacy subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `RealmId`
//! - **Resources**: `ResourceId`, `ResourceAmount`
//! - **Authority**: `AuthorityLevel`, `ActionType`
//! - **Negotiation**: `Topic`, `SessionPhase`, `SessionOutcome`

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Numeric resource type identifier (Stone = 1, Wood = 3, Lords = 253, ...).
pub type ResourceId = u32;

/// Opaque realm identifier.
///
/// Ordering is lexicographic on the underlying string and is used for
/// deterministic tie-breaks between concurrent proposals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RealmId(pub String);

impl RealmId {
    /// Create a realm id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RealmId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RealmId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// CLUSTER B: RESOURCES
// =============================================================================

/// A quantity of a single resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAmount {
    /// Resource type id.
    pub resource: ResourceId,
    /// Amount in resource units.
    pub amount: u64,
}

impl ResourceAmount {
    /// Create a new resource amount.
    pub fn new(resource: ResourceId, amount: u64) -> Self {
        Self { resource, amount }
    }
}

/// Sum the units across a list of resource amounts, saturating on overflow.
pub fn total_units(resources: &[ResourceAmount]) -> u64 {
    resources
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.amount))
}

/// Well-known resource type ids.
pub mod resources {
    use super::ResourceId;

    pub const STONE: ResourceId = 1;
    pub const COAL: ResourceId = 2;
    pub const WOOD: ResourceId = 3;
    pub const COPPER: ResourceId = 4;
    pub const IRONWOOD: ResourceId = 5;
    pub const OBSIDIAN: ResourceId = 6;
    pub const GOLD: ResourceId = 7;
    pub const SILVER: ResourceId = 8;
    pub const MITHRAL: ResourceId = 9;
    pub const DIAMONDS: ResourceId = 14;
    pub const DRAGONHIDE: ResourceId = 22;
    pub const ANCIENT_FRAGMENT: ResourceId = 29;
    pub const DONKEY: ResourceId = 249;
    pub const LORDS: ResourceId = 253;
    pub const WHEAT: ResourceId = 254;
    pub const FISH: ResourceId = 255;
}

// =============================================================================
// CLUSTER C: AUTHORITY
// =============================================================================

/// Kind of action a realm asks permission to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Open communication with another realm.
    Greeting,
    /// Ask a counterparty to prove ownership/standing.
    Verification,
    /// Exchange resources.
    Trade,
    /// Form an alliance.
    Alliance,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Greeting => "GREETING",
            Self::Verification => "VERIFICATION",
            Self::Trade => "TRADE",
            Self::Alliance => "ALLIANCE",
        };
        f.write_str(s)
    }
}

/// Ordered permission tier.
///
/// | Level | Trade ceiling | Alliances |
/// |-------|---------------|-----------|
/// | 1 | none | no |
/// | 2 | 100,000 | no |
/// | 3 | 1,000,000 | no |
/// | 4 | unlimited | yes |
/// | 5 | unlimited | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthorityLevel {
    /// Greetings and verification only.
    #[serde(rename = "LEVEL_1")]
    Level1,
    /// Trades up to 100,000 units.
    #[serde(rename = "LEVEL_2")]
    Level2,
    /// Trades up to 1,000,000 units.
    #[serde(rename = "LEVEL_3")]
    Level3,
    /// Unlimited trades and alliance formation.
    #[serde(rename = "LEVEL_4")]
    Level4,
    /// Everything level 4 can do, plus operator overrides.
    #[serde(rename = "LEVEL_5")]
    Level5,
}

impl AuthorityLevel {
    /// All levels in ascending order.
    pub const ALL: [AuthorityLevel; 5] = [
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Level4,
        Self::Level5,
    ];

    /// Maximum trade volume in resource units. `None` means unlimited.
    pub fn trade_ceiling(&self) -> Option<u64> {
        match self {
            Self::Level1 => Some(0),
            Self::Level2 => Some(100_000),
            Self::Level3 => Some(1_000_000),
            Self::Level4 | Self::Level5 => None,
        }
    }

    /// Whether this level may form alliances.
    pub fn can_form_alliance(&self) -> bool {
        *self >= Self::Level4
    }

    /// Lowest level that permits `action` at the given volume.
    pub fn required_for(action: ActionType, volume: u64) -> AuthorityLevel {
        match action {
            ActionType::Greeting | ActionType::Verification => Self::Level1,
            ActionType::Alliance => Self::Level4,
            ActionType::Trade => Self::ALL
                .into_iter()
                .find(|level| match level.trade_ceiling() {
                    Some(ceiling) => ceiling > 0 && volume <= ceiling,
                    None => true,
                })
                .unwrap_or(Self::Level4),
        }
    }

    /// Map a numeric realm level (as reported by the fact source) to a tier.
    ///
    /// Values above 5 clamp to `Level5`; zero maps to `Level1`.
    pub fn from_realm_level(level: u8) -> AuthorityLevel {
        match level {
            0 | 1 => Self::Level1,
            2 => Self::Level2,
            3 => Self::Level3,
            4 => Self::Level4,
            _ => Self::Level5,
        }
    }

    /// Numeric rank, 1 through 5.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level4 => 4,
            Self::Level5 => 5,
        }
    }
}

impl fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LEVEL_{}", self.rank())
    }
}

// =============================================================================
// CLUSTER D: NEGOTIATION
// =============================================================================

/// Subject of a negotiation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    /// Resource exchange.
    Trade,
    /// Alliance formation.
    Alliance,
}

impl Topic {
    /// The action the gate must authorize for this topic.
    pub fn action(&self) -> ActionType {
        match self {
            Self::Trade => ActionType::Trade,
            Self::Alliance => ActionType::Alliance,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trade => f.write_str("TRADE"),
            Self::Alliance => f.write_str("ALLIANCE"),
        }
    }
}

/// Unique negotiation session identifier.
pub type SessionId = Uuid;

/// Phase of a negotiation session.
///
/// `Accepted`, `Rejected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Authority and resources are being checked.
    Verification,
    /// Proposal and counter-proposals are exchanged.
    Negotiation,
    /// Agreed terms are being committed externally.
    Execution,
    /// Committed successfully.
    Accepted,
    /// Declined, failed verification, or ran out of rounds.
    Rejected,
    /// Expired, cancelled, timed out, or commit failed.
    Failed,
}

impl SessionPhase {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Failed)
    }

    /// Position in the forward-only phase order. Terminal phases share the
    /// highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Verification => 0,
            Self::Negotiation => 1,
            Self::Execution => 2,
            Self::Accepted | Self::Rejected | Self::Failed => 3,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verification => "VERIFICATION",
            Self::Negotiation => "NEGOTIATION",
            Self::Execution => "EXECUTION",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Why a session reached its terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    /// External commit confirmed.
    Completed,
    /// Counterparty explicitly declined.
    Declined,
    /// Authority or resource check failed.
    VerificationFailed,
    /// Round counter exceeded its maximum.
    Exhausted,
    /// Deadline passed.
    Expired,
    /// External commit failed.
    ExecutionFailed,
    /// Operator cancelled.
    Cancelled,
    /// Delegated calls kept timing out.
    TimedOut,
    /// Unexpected failure at the agent boundary.
    Internal,
}

impl OutcomeKind {
    /// Terminal phase this outcome lands in.
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Completed => SessionPhase::Accepted,
            Self::Declined | Self::VerificationFailed | Self::Exhausted => SessionPhase::Rejected,
            Self::Expired
            | Self::ExecutionFailed
            | Self::Cancelled
            | Self::TimedOut
            | Self::Internal => SessionPhase::Failed,
        }
    }

    /// Default reason string for this outcome.
    pub fn default_reason(&self) -> &'static str {
        use crate::errors::reasons;
        match self {
            Self::Completed => "COMMITTED",
            Self::Declined => reasons::DECLINED,
            Self::VerificationFailed => reasons::INSUFFICIENT_AUTHORITY,
            Self::Exhausted => reasons::NEGOTIATION_EXHAUSTED,
            Self::Expired => reasons::EXPIRED,
            Self::ExecutionFailed => "COMMIT_FAILED",
            Self::Cancelled => reasons::CANCELLED,
            Self::TimedOut => reasons::TIMEOUT,
            Self::Internal => reasons::INTERNAL,
        }
    }
}

/// Summary of a terminal session, consumed by the relationship tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Session that closed.
    pub session_id: SessionId,
    /// Initiating realm.
    pub realm_a: RealmId,
    /// Counterparty realm.
    pub realm_b: RealmId,
    /// What was negotiated.
    pub topic: Topic,
    /// Terminal phase.
    pub phase: SessionPhase,
    /// Cause of termination.
    pub kind: OutcomeKind,
    /// Reason string (e.g. `INSUFFICIENT_AUTHORITY`).
    pub reason: String,
    /// Counter-proposal rounds played.
    pub rounds: u32,
    /// When the session closed.
    pub closed_at: Timestamp,
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
