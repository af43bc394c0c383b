//! Relationship tracker configuration.

use serde::{Deserialize, Serialize};

/// Trust deltas and escalation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Trust gained per accepted session.
    pub accept_delta: f64,
    /// Trust lost per explicit decline.
    pub decline_penalty: f64,
    /// Trust lost per exhausted, expired, timed-out or failed session.
    pub failure_penalty: f64,
    /// Consecutive counted failures that turn a pair HOSTILE.
    pub hostile_after: u32,
    /// Further consecutive failures while HOSTILE that turn a pair BLOCKED.
    pub hostile_block_threshold: u32,
    /// Lower trust bound.
    pub min_trust: f64,
    /// Upper trust bound.
    pub max_trust: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            accept_delta: 10.0,
            decline_penalty: 2.0,
            failure_penalty: 5.0,
            hostile_after: 3,
            hostile_block_threshold: 2,
            min_trust: -100.0,
            max_trust: 100.0,
        }
    }
}

impl TrackerConfig {
    /// Clamp a trust score into the configured bounds.
    pub fn clamp_trust(&self, trust: f64) -> f64 {
        trust.clamp(self.min_trust, self.max_trust)
    }
}
