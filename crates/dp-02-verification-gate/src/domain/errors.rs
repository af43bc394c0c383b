//! # Domain Errors

use shared_types::{reasons, AuthorityLevel, DiplomacyError, RealmId};
use thiserror::Error;

use super::entities::{EntityId, ResourceShortfall};

/// Errors reported by a fact source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    /// No facts recorded for the realm.
    #[error("Unknown realm: {0}")]
    UnknownRealm(RealmId),

    /// No balances recorded for the entity.
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// The source could not answer.
    #[error("Fact source unavailable: {0}")]
    Unavailable(String),
}

/// Verification gate errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Granted authority is below the required level.
    #[error("Insufficient authority for {realm}: required {required}, granted {granted:?}")]
    InsufficientAuthority {
        /// Realm checked.
        realm: RealmId,
        /// Level needed.
        required: AuthorityLevel,
        /// Level held, if known.
        granted: Option<AuthorityLevel>,
    },

    /// Balances do not cover the requested resources.
    #[error("Resources unavailable for {realm}: {} shortfall(s)", shortfalls.len())]
    ResourcesUnavailable {
        /// Realm checked.
        realm: RealmId,
        /// Every resource type that falls short.
        shortfalls: Vec<ResourceShortfall>,
    },

    /// The order cannot be taken on the proposed terms.
    #[error("Order {trade_id} unavailable to {taker}")]
    OrderUnavailable {
        /// Order requested.
        trade_id: u64,
        /// Realm that asked to take it.
        taker: RealmId,
    },

    /// The fact source failed; the verdict is unknown.
    #[error("Fact source failed: {0}")]
    Provider(FactError),
}

impl GateError {
    /// Machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientAuthority { .. } => reasons::INSUFFICIENT_AUTHORITY,
            Self::ResourcesUnavailable { .. } => reasons::RESOURCES_UNAVAILABLE,
            Self::OrderUnavailable { .. } => reasons::ORDER_UNAVAILABLE,
            Self::Provider(_) => reasons::INTERNAL,
        }
    }

    /// A definitive verification failure, as opposed to a fact source fault.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, Self::Provider(_))
    }
}

impl From<FactError> for GateError {
    fn from(err: FactError) -> Self {
        GateError::Provider(err)
    }
}

impl From<GateError> for DiplomacyError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Provider(inner) => DiplomacyError::Internal(inner.to_string()),
            verdict => DiplomacyError::verification(verdict.reason()),
        }
    }
}
