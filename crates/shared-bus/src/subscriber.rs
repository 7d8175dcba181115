//! # Message Subscriber
//!
//! Defines the subscription side of the bus.

use crate::message::BusMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscriber fell behind and messages were dropped.
    ///
    /// The subscription stays usable.
    #[error("Subscriber lagged, {0} messages dropped")]
    Lagged(u64),

    /// The bus was closed.
    #[error("Bus closed")]
    Closed,
}

impl SubscriptionError {
    /// Whether no further message can arrive on this subscription.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Receiving side of a channel subscription.
///
/// The relay's bus listener depends on this trait only, so any pub/sub
/// transport can back it.
#[async_trait]
pub trait MessageSubscription: Send {
    /// Wait for the next message on the subscribed channel.
    async fn recv(&mut self) -> Result<BusMessage, SubscriptionError>;

    /// Name of the subscribed channel.
    fn channel(&self) -> &str;
}

/// A subscription handle for one channel of the in-memory bus.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusMessage>,

    /// Subscribed channel.
    channel: String,

    /// Reference to subscription tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusMessage>,
        channel: String,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    ) -> Self {
        Self {
            receiver,
            channel,
            subscriptions,
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message for this channel was available
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(_)` - The subscriber lagged or the bus was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(SubscriptionError::Lagged(n))
                }
            };

            if message.channel == self.channel {
                return Ok(Some(message));
            }
        }
    }
}

#[async_trait]
impl MessageSubscription for Subscription {
    async fn recv(&mut self) -> Result<BusMessage, SubscriptionError> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(channel = %self.channel, lagged = n, "Subscriber lagged");
                    return Err(SubscriptionError::Lagged(n));
                }
            };

            if message.channel == self.channel {
                return Ok(message);
            }
            // Other channel, keep waiting
        }
    }

    fn channel(&self) -> &str {
        &self.channel
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.channel) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.channel);
        }
        debug!(channel = %self.channel, "Subscription dropped");
    }
}
