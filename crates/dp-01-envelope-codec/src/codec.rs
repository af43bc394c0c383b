//! # Envelope Codec
//!
//! Explicit serializer and parser for the diplomatic wire format. Validation
//! runs on structured fields, never on rendered text.

use serde::Serialize;
use serde_json::{Map, Value};
use shared_types::{now_millis, RealmId};
use tracing::trace;
use uuid::Uuid;

use crate::domain::{CodecError, MessageEnvelope, MessageType, PROTOCOL_VERSION, REQUIRED_FIELDS};

/// Build an envelope from a wire type name.
///
/// Fails with [`CodecError::EmptyType`] / [`CodecError::UnknownType`] for a
/// bad type, and with a payload error if `payload` is not a JSON object.
pub fn encode<P: Serialize + ?Sized>(
    message_type: &str,
    source: &RealmId,
    target: &RealmId,
    payload: &P,
    reference_id: Option<Uuid>,
) -> Result<MessageEnvelope, CodecError> {
    let message_type: MessageType = message_type.parse()?;
    encode_typed(message_type, source, target, payload, reference_id)
}

/// Build an envelope from a typed message kind, stamped with a fresh id and
/// the current time.
pub fn encode_typed<P: Serialize + ?Sized>(
    message_type: MessageType,
    source: &RealmId,
    target: &RealmId,
    payload: &P,
    reference_id: Option<Uuid>,
) -> Result<MessageEnvelope, CodecError> {
    let payload = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(CodecError::PayloadNotObject),
        Err(e) => return Err(CodecError::Unrepresentable(e.to_string())),
    };

    let envelope = MessageEnvelope {
        message_type,
        message_id: Uuid::new_v4(),
        source_realm: source.clone(),
        target_realm: target.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        timestamp: i64::try_from(now_millis()).unwrap_or(i64::MAX),
        reference_id,
        payload,
        extensions: Map::new(),
    };

    trace!(
        message_type = %envelope.message_type,
        message_id = %envelope.message_id,
        source = %source,
        target = %target,
        "Envelope encoded"
    );
    Ok(envelope)
}

/// Parse a raw wire message.
///
/// Missing required fields and structural errors fail; unknown fields are
/// retained. Decoding does not run [`validate`].
pub fn decode(raw: &str) -> Result<MessageEnvelope, CodecError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CodecError::Malformed(e.to_string()))?;
    decode_value(value)
}

/// Parse an already-deserialized JSON value.
pub fn decode_value(value: Value) -> Result<MessageEnvelope, CodecError> {
    let Some(object) = value.as_object() else {
        return Err(CodecError::Malformed("envelope is not a JSON object".into()));
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(CodecError::MissingField(missing));
    }

    if let Some(Value::String(t)) = object.get("type") {
        // Surface empty/unknown types with their own errors instead of a
        // generic serde variant message.
        t.parse::<MessageType>()?;
    }

    serde_json::from_value(value).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Serialize an envelope to its JSON wire form.
pub fn to_wire(envelope: &MessageEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(|e| CodecError::Unrepresentable(e.to_string()))
}

/// Check protocol-level well-formedness.
///
/// - `protocol_version` must equal [`PROTOCOL_VERSION`]
/// - `timestamp` must be non-negative (not required to increase)
/// - response types carry `reference_id`, initiating types do not
pub fn validate(envelope: &MessageEnvelope) -> Result<(), CodecError> {
    if envelope.protocol_version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(
            envelope.protocol_version.clone(),
        ));
    }
    if envelope.timestamp < 0 {
        return Err(CodecError::NegativeTimestamp(envelope.timestamp));
    }
    match (envelope.message_type.is_response(), envelope.reference_id) {
        (true, None) => Err(CodecError::MissingReference(envelope.message_type)),
        (false, Some(_)) => Err(CodecError::UnexpectedReference(envelope.message_type)),
        _ => Ok(()),
    }
}

/// Decode then validate in one step.
pub fn decode_validated(raw: &str) -> Result<MessageEnvelope, CodecError> {
    let envelope = decode(raw)?;
    validate(&envelope)?;
    Ok(envelope)
}
