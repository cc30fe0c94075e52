//! Subscription bridge: store channel messages into the event bus.
//!
//! The bridge is installed exactly once per subscriber connection, by the
//! subscribe pool's factory when it opens the connection. From then on
//! every `(channel, message)` the store delivers is re-emitted on the
//! facade's [`EventBus`] under the channel name. The bus, not the store
//! connection, fans a message out to local listeners, so one store-level
//! subscription per channel serves any number of them.
//!
//! The bridge holds the bus but not the connection; the connection holds
//! the bridge's handler until it is dropped.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::EventBus;
use crate::store::{MessageHandler, StoreError, SubscriberConnection};

/// Forwards store messages to an [`EventBus`].
#[derive(Debug, Clone)]
pub struct SubscriptionBridge {
    events: EventBus,
}

impl SubscriptionBridge {
    /// Creates a bridge delivering into `events`.
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// The bus messages are delivered into.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Re-emits `message` under `channel`, returning the number of local
    /// listeners that received it.
    pub fn forward(&self, channel: &str, message: &str) -> usize {
        let delivered = self.events.emit(channel, message);
        tracing::trace!(channel, delivered, "store message forwarded");
        delivered
    }

    /// Handler to install on a subscriber connection.
    #[must_use]
    pub fn handler(&self) -> MessageHandler {
        let bridge = self.clone();
        Arc::new(move |channel: &str, message: &str| {
            bridge.forward(channel, message);
        })
    }
}

/// Subscriber connection together with the channels it has joined.
///
/// Repeated subscriptions to the same channel are answered locally
/// without another store round trip.
pub struct BridgedSubscriber<C> {
    connection: C,
    channels: HashSet<String>,
}

impl<C: SubscriberConnection> BridgedSubscriber<C> {
    /// Wraps a freshly opened subscriber connection.
    #[must_use]
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            channels: HashSet::new(),
        }
    }

    /// Subscribes to `channel` unless already subscribed.
    ///
    /// Returns `true` if a store-level subscription was issued.
    ///
    /// # Errors
    ///
    /// Returns the store error if the subscription was not acknowledged;
    /// the channel is then not recorded and will be retried next time.
    pub async fn subscribe(&mut self, channel: &str) -> Result<bool, StoreError> {
        if self.channels.contains(channel) {
            return Ok(false);
        }
        self.connection.subscribe(channel).await?;
        self.channels.insert(channel.to_string());
        tracing::debug!(channel, "store channel subscribed");
        Ok(true)
    }

    /// Whether the underlying connection is still receiving messages.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Whether `channel` has been subscribed on this connection.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// Number of channels subscribed on this connection.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl<C> fmt::Debug for BridgedSubscriber<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedSubscriber")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::Listener;

    #[derive(Default)]
    struct CountingSubscriber {
        calls: Arc<AtomicUsize>,
        reject: bool,
        closed: bool,
    }

    #[async_trait]
    impl SubscriberConnection for CountingSubscriber {
        async fn subscribe(&mut self, _channel: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(StoreError::Rejected("denied".to_string()));
            }
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed
        }
    }

    #[test]
    fn handler_emits_under_channel_name() {
        let events = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.on(
            "orders",
            Listener::new(move |payload| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(payload.to_string());
                }
            }),
        );

        let handler = SubscriptionBridge::new(events.clone()).handler();
        handler("orders", "created");
        handler("other", "ignored");

        let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec!["created"]);
    }

    #[tokio::test]
    async fn repeated_subscription_hits_store_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sub = BridgedSubscriber::new(CountingSubscriber {
            calls: Arc::clone(&calls),
            ..CountingSubscriber::default()
        });

        assert!(assert_ok!(sub.subscribe("news").await));
        assert!(!assert_ok!(sub.subscribe("news").await));
        assert!(assert_ok!(sub.subscribe("sports").await));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sub.channel_count(), 2);
    }

    #[tokio::test]
    async fn rejected_subscription_is_not_recorded() {
        let mut sub = BridgedSubscriber::new(CountingSubscriber {
            reject: true,
            ..CountingSubscriber::default()
        });
        assert_err!(sub.subscribe("news").await);
        assert!(!sub.is_subscribed("news"));
    }

    #[test]
    fn liveness_follows_connection() {
        let open = BridgedSubscriber::new(CountingSubscriber::default());
        assert!(open.is_open());
        let closed = BridgedSubscriber::new(CountingSubscriber {
            closed: true,
            ..CountingSubscriber::default()
        });
        assert!(!closed.is_open());
    }
}
