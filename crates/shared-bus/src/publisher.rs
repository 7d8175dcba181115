//! # Task Publisher
//!
//! Defines the publishing side of the task-distribution bus.

use crate::message::BusMessage;
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing payloads to the bus.
///
/// The scheduler side of the system uses this to hand new work to whichever
/// relay instance owns the target sensor.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    /// Publish a payload on a channel.
    ///
    /// # Returns
    ///
    /// The number of active subscriptions the message reached.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> usize;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Every relay instance in a deployment would share an external pub/sub
/// transport instead; within one process this adapter behaves the same way.
pub struct InMemoryTaskBus {
    /// Broadcast sender for messages on all channels.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription count by channel.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryTaskBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to a single channel.
    #[must_use]
    pub fn subscribe(&self, channel: &str) -> Subscription {
        let receiver = self.sender.subscribe();

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(channel.to_string()).or_insert(0) += 1;
        }

        debug!(channel, "New subscription created");

        Subscription::new(receiver, channel.to_string(), self.subscriptions.clone())
    }

    /// Number of live subscriptions on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.get(channel).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryTaskBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskPublisher for InMemoryTaskBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> usize {
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let receivers = self.subscriber_count(channel);
        let message = BusMessage::new(channel, payload);
        let bytes = message.len();

        match self.sender.send(message) {
            Ok(_) => {
                debug!(channel, bytes, receivers, "Message published");
                receivers
            }
            Err(e) => {
                warn!(channel, error = %e, "Message dropped (no receivers)");
                0
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
