//! # Shared Bus - Lifecycle Event Bus
//!
//! Typed publish/subscribe channel that carries diplomacy lifecycle events
//! from protocol agents to any number of observers.
//!
//! ## Rules
//!
//! - Agents publish; they never call observers directly.
//! - Every event has a fixed payload shape ([`DiplomacyEvent`]).
//! - Publishing never blocks on observers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Agent 6933   │                    │  Observer    │
//! │              │    publish()       │  (logger,    │
//! │              │ ──────┐            │   metrics)   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{DiplomacyEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
