//! # Message Envelope
//!
//! The structured unit exchanged between realms.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::RealmId;
use uuid::Uuid;

use super::message_type::MessageType;

/// The only accepted protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Top-level fields every envelope must carry on the wire.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "type",
    "source_realm",
    "target_realm",
    "protocol_version",
    "timestamp",
    "payload",
];

/// Diplomatic message envelope.
///
/// Unknown top-level fields land in `extensions` and unknown payload fields
/// stay in `payload`; both are written back out unchanged so newer agents
/// can extend the format without breaking older ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Id of this message; responses point at it through `reference_id`.
    #[serde(default = "Uuid::new_v4")]
    pub message_id: Uuid,
    /// Sending realm.
    pub source_realm: RealmId,
    /// Receiving realm.
    pub target_realm: RealmId,
    /// Always [`PROTOCOL_VERSION`] for valid envelopes.
    pub protocol_version: String,
    /// Milliseconds since the Unix epoch at the sender.
    pub timestamp: i64,
    /// Message this one answers. Present exactly on response types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<Uuid>,
    /// Message body.
    pub payload: Map<String, Value>,
    /// Unrecognized top-level fields, preserved verbatim.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl MessageEnvelope {
    /// Whether this envelope answers an earlier message.
    pub fn is_response(&self) -> bool {
        self.message_type.is_response()
    }

    /// Read a typed payload field. Returns `None` if absent or mistyped.
    pub fn payload_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.payload
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Read the whole payload as a typed structure, ignoring unknown fields.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).ok()
    }
}
