//! Purpose-specific connection factories.
//!
//! Each pool gets its own factory. The subscribe factory is where the
//! [`SubscriptionBridge`] gets attached: its handler is handed to the
//! store when the subscriber connection is opened.
//!
//! A subscriber connection that dies takes its subscriptions with it. The
//! subscribe factory reports such a connection as dead, and when it opens
//! the replacement it re-joins every channel that still has listeners.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{ConnectionFactory, Purpose};
use crate::bridge::{BridgedSubscriber, SubscriptionBridge};
use crate::store::{Store, StoreError};

/// Opens data connections.
pub struct DataFactory<S> {
    store: Arc<S>,
}

impl<S: Store> DataFactory<S> {
    /// Creates a factory over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> ConnectionFactory for DataFactory<S> {
    type Connection = S::Data;
    const PURPOSE: Purpose = Purpose::Data;

    async fn create(&self, name: &str) -> Result<Self::Connection, StoreError> {
        self.store.connect_data(name).await
    }
}

/// Opens trigger (publish) connections.
pub struct TriggerFactory<S> {
    store: Arc<S>,
}

impl<S: Store> TriggerFactory<S> {
    /// Creates a factory over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> ConnectionFactory for TriggerFactory<S> {
    type Connection = S::Trigger;
    const PURPOSE: Purpose = Purpose::Trigger;

    async fn create(&self, name: &str) -> Result<Self::Connection, StoreError> {
        self.store.connect_trigger(name).await
    }
}

/// Opens subscriber connections wired to a [`SubscriptionBridge`].
pub struct SubscribeFactory<S> {
    store: Arc<S>,
    bridge: SubscriptionBridge,
    replacing: AtomicBool,
}

impl<S: Store> SubscribeFactory<S> {
    /// Creates a factory over `store` forwarding messages through `bridge`.
    #[must_use]
    pub const fn new(store: Arc<S>, bridge: SubscriptionBridge) -> Self {
        Self {
            store,
            bridge,
            replacing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<S: Store> ConnectionFactory for SubscribeFactory<S> {
    type Connection = BridgedSubscriber<S::Subscriber>;
    const PURPOSE: Purpose = Purpose::Subscribe;

    async fn create(&self, name: &str) -> Result<Self::Connection, StoreError> {
        let connection = self
            .store
            .connect_subscriber(name, self.bridge.handler())
            .await?;
        tracing::debug!(connection = name, "subscription bridge installed");
        let mut subscriber = BridgedSubscriber::new(connection);

        if self.replacing.load(Ordering::SeqCst) {
            for channel in self.bridge.events().event_names() {
                subscriber.subscribe(&channel).await?;
            }
            tracing::info!(
                connection = name,
                channels = subscriber.channel_count(),
                "subscriptions restored on replacement connection"
            );
        }
        self.replacing.store(true, Ordering::SeqCst);
        Ok(subscriber)
    }

    fn is_live(&self, connection: &Self::Connection) -> bool {
        connection.is_open()
    }
}

impl<S> fmt::Debug for DataFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFactory").finish_non_exhaustive()
    }
}

impl<S> fmt::Debug for TriggerFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerFactory").finish_non_exhaustive()
    }
}

impl<S> fmt::Debug for SubscribeFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeFactory")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
