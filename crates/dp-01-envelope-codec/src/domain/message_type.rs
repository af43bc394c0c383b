//! # Message Types
//!
//! The closed set of diplomatic message kinds and their wire names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::CodecError;

/// Diplomatic message kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Opens communication with another realm.
    Greeting,
    /// Answers a greeting.
    GreetingResponse,
    /// Proposes a resource exchange.
    TradeProposal,
    /// Proposes an alliance.
    AllianceRequest,
    /// Requests proof of ownership/standing.
    Verification,
    /// Accepts the referenced message.
    Acknowledgment,
    /// Declines the referenced message.
    Rejection,
    /// Replaces the terms of the referenced proposal.
    CounterProposal,
}

impl MessageType {
    /// Every message type, in wire-table order.
    pub const ALL: [MessageType; 8] = [
        Self::Greeting,
        Self::GreetingResponse,
        Self::TradeProposal,
        Self::AllianceRequest,
        Self::Verification,
        Self::Acknowledgment,
        Self::Rejection,
        Self::CounterProposal,
    ];

    /// Wire name, e.g. `TRADE_PROPOSAL`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "GREETING",
            Self::GreetingResponse => "GREETING_RESPONSE",
            Self::TradeProposal => "TRADE_PROPOSAL",
            Self::AllianceRequest => "ALLIANCE_REQUEST",
            Self::Verification => "VERIFICATION",
            Self::Acknowledgment => "ACKNOWLEDGMENT",
            Self::Rejection => "REJECTION",
            Self::CounterProposal => "COUNTER_PROPOSAL",
        }
    }

    /// Response types answer an earlier message and must carry `reference_id`.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::GreetingResponse | Self::Acknowledgment | Self::Rejection | Self::CounterProposal
        )
    }

    /// Whether this message opens a negotiation session.
    pub fn opens_session(&self) -> bool {
        matches!(self, Self::TradeProposal | Self::AllianceRequest)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CodecError::EmptyType);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == trimmed)
            .ok_or_else(|| CodecError::UnknownType(trimmed.to_string()))
    }
}
