//! # Outbound Ports
//!
//! External collaborators. Both may be slow; the agent wraps every call in a
//! timeout and retries timeouts only.

use async_trait::async_trait;
use dp_01_envelope_codec::MessageEnvelope;

use crate::domain::{CommitReceipt, ExecutionError, ExecutionRequest, ThinkError};

/// Natural-language message composer - outbound port.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Produce message text in reply to `prompt`.
    async fn think(&self, prompt: &MessageEnvelope) -> Result<String, ThinkError>;
}

/// Commits agreed terms externally - outbound port.
///
/// `request.session_id` is the idempotency key. The agent retries a commit
/// whose attempt timed out, and a timed-out attempt may still have landed;
/// an implementation must settle at most one request per session and refuse
/// the rest with [`ExecutionError::Rejected`].
#[async_trait]
pub trait ExecutionCollaborator: Send + Sync {
    /// Submit one contract call and wait for its result.
    async fn commit(&self, request: ExecutionRequest) -> Result<CommitReceipt, ExecutionError>;
}
