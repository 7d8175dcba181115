//! # Shared Bus - Task Distribution Bus
//!
//! Channel-based publish/subscribe used by the scheduler to hand newly
//! scheduled tasks to relay instances.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Scheduler   │                    │ Relay (each) │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Task Bus    │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(channel)
//! ```
//!
//! - Every subscriber of a channel sees every message on it (fan-out).
//! - Payloads are opaque bytes; routing happens in the subscriber.
//! - Delivery is best-effort: a subscriber that falls behind is told how many
//!   messages it lost and keeps going.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use message::BusMessage;
pub use publisher::{InMemoryTaskBus, TaskPublisher};
pub use subscriber::{MessageSubscription, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Channel the scheduler publishes new tasks on.
pub const DEFAULT_TASK_CHANNEL: &str = "scheduler-new-task";
