//! # Scripted Reasoner
//!
//! Reasoning engine that replays queued answers, then falls back to a fixed
//! line built from the prompt.

use async_trait::async_trait;
use dp_01_envelope_codec::MessageEnvelope;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::ThinkError;
use crate::ports::ReasoningEngine;

/// Deterministic [`ReasoningEngine`].
#[derive(Default)]
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<String, ThinkError>>>,
    latency: RwLock<Option<Duration>>,
    calls: AtomicU64,
}

impl ScriptedReasoner {
    /// Reasoner with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one answer.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.script.lock().push_back(Ok(text.into()));
    }

    /// Queue one failure.
    pub fn push_failure(&self, err: ThinkError) {
        self.script.lock().push_back(Err(err));
    }

    /// Delay every answer by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of `think` calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedReasoner {
    async fn think(&self, prompt: &MessageEnvelope) -> Result<String, ThinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(answer) => answer,
            None => Ok(format!(
                "Realm {} acknowledges your {} and extends its regards.",
                prompt.target_realm,
                prompt.message_type.as_str()
            )),
        }
    }
}
