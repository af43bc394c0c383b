//! # Domain Errors
//!
//! Every codec failure is a format error at the protocol level.

use shared_types::DiplomacyError;
use thiserror::Error;

use super::message_type::MessageType;

/// Envelope codec error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// `type` was empty.
    #[error("Empty message type")]
    EmptyType,

    /// `type` is not one of the protocol's message types.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// Payload must serialize to a JSON object.
    #[error("Payload is not a JSON object")]
    PayloadNotObject,

    /// Payload could not be serialized at all.
    #[error("Payload not representable: {0}")]
    Unrepresentable(String),

    /// Input is not parsable as an envelope.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// A required field is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// `protocol_version` is not supported.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Timestamp below zero.
    #[error("Negative timestamp: {0}")]
    NegativeTimestamp(i64),

    /// Response message without `reference_id`.
    #[error("{0} requires reference_id")]
    MissingReference(MessageType),

    /// Initiating message carrying a `reference_id`.
    #[error("{0} must not carry reference_id")]
    UnexpectedReference(MessageType),
}

impl From<CodecError> for DiplomacyError {
    fn from(err: CodecError) -> Self {
        DiplomacyError::Format(err.to_string())
    }
}
