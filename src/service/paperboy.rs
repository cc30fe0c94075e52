//! The facade: pooled data operations and named-event pub/sub.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::SubscriptionBridge;
use crate::config::PaperboyConfig;
use crate::domain::{EventBus, Listener, PushOptions, Reply};
use crate::error::PaperboyError;
use crate::pool::{DataFactory, Pool, PoolStatus, Purpose, SubscribeFactory, TriggerFactory};
use crate::store::{
    DataConnection, Operation, RedisStore, Store, StoreError, TriggerConnection,
};

/// Shortest expiry the store can express (`PX 1`).
const MIN_EXPIRY: Duration = Duration::from_millis(1);

/// Facade over a remote key-value / pub-sub store.
///
/// Owns three single-connection pools (data, trigger, subscribe) and one
/// [`EventBus`]. Every store operation follows the same pattern: validate
/// arguments → acquire from the purpose's pool → issue one command →
/// release → return the result or the error. The connection is always
/// released before an error is returned.
///
/// Inbound channel messages reach listeners through the subscription
/// bridge installed on the subscribe pool's connection, independently of
/// any acquire/release cycle.
pub struct Paperboy<S: Store = RedisStore> {
    connection_name: String,
    data: Pool<DataFactory<S>>,
    trigger: Pool<TriggerFactory<S>>,
    subscribe: Pool<SubscribeFactory<S>>,
    events: EventBus,
}

impl Paperboy<RedisStore> {
    /// Creates a facade over the Redis server named in `config`.
    ///
    /// No connection is opened until the first operation needs one.
    ///
    /// # Errors
    ///
    /// Returns [`PaperboyError::Configuration`] if the URL is malformed.
    pub fn connect(config: &PaperboyConfig) -> Result<Self, PaperboyError> {
        let store = RedisStore::open(&config.redis_url).map_err(|e| {
            PaperboyError::Configuration(format!("invalid store url: {e}"))
        })?;
        Ok(Self::with_store(store, &config.connection_name))
    }

    /// Creates a facade from environment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PaperboyError::Configuration`] if `PAPERBOY_REDIS_URL` is
    /// missing or malformed.
    pub fn from_env() -> Result<Self, PaperboyError> {
        Self::connect(&PaperboyConfig::from_env()?)
    }
}

impl<S: Store> Paperboy<S> {
    /// Creates a facade over any store backend.
    ///
    /// The pools are configured here and populated lazily; the event bus is
    /// private to this instance.
    #[must_use]
    pub fn with_store(store: S, connection_name: &str) -> Self {
        let store = Arc::new(store);
        let events = EventBus::new();
        let bridge = SubscriptionBridge::new(events.clone());

        Self {
            connection_name: connection_name.to_string(),
            data: Pool::new(
                DataFactory::new(Arc::clone(&store)),
                Purpose::Data.connection_name(connection_name),
            ),
            trigger: Pool::new(
                TriggerFactory::new(Arc::clone(&store)),
                Purpose::Trigger.connection_name(connection_name),
            ),
            subscribe: Pool::new(
                SubscribeFactory::new(store, bridge),
                Purpose::Subscribe.connection_name(connection_name),
            ),
            events,
        }
    }

    /// Connection name this facade was built with.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// The facade's event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns a snapshot of the pool serving `purpose`.
    #[must_use]
    pub fn pool_status(&self, purpose: Purpose) -> PoolStatus {
        match purpose {
            Purpose::Data => self.data.status(),
            Purpose::Trigger => self.trigger.status(),
            Purpose::Subscribe => self.subscribe.status(),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// - [`PaperboyError::InvalidArgument`] if `key` or `value` is empty or
    ///   the expiry is shorter than one millisecond; no connection is
    ///   acquired.
    /// - [`PaperboyError::Connection`] if the data connection is unavailable.
    /// - [`PaperboyError::StoreOperation`] if the `SET` fails.
    pub async fn push(
        &self,
        key: &str,
        value: &str,
        options: PushOptions,
    ) -> Result<Reply, PaperboyError> {
        require(key, "no key")?;
        require(value, "no value")?;
        if options.expire.is_some_and(|ttl| ttl < MIN_EXPIRY) {
            return Err(PaperboyError::invalid("expiration must be at least one millisecond"));
        }

        let mut conn = self.data.acquire().await?;
        let outcome = conn.set(key, value, options.expire).await;
        conn.release();
        outcome.map_err(|source| store_failure(Operation::Set, source))?;

        tracing::debug!(key, expire = ?options.expire, "value pushed");
        Ok(Reply::new(key, value))
    }

    /// Reads the value stored under `key`.
    ///
    /// Resolves to `None` when the key does not exist or has expired, and
    /// to `Some("")` for a stored empty string.
    ///
    /// # Errors
    ///
    /// - [`PaperboyError::Connection`] if the data connection is unavailable.
    /// - [`PaperboyError::StoreOperation`] if the `GET` fails.
    pub async fn pull(&self, key: &str) -> Result<Option<String>, PaperboyError> {
        let mut conn = self.data.acquire().await?;
        let outcome = conn.get(key).await;
        conn.release();
        let value = outcome.map_err(|source| store_failure(Operation::Get, source))?;

        tracing::debug!(key, found = value.is_some(), "value pulled");
        Ok(value)
    }

    /// Deletes `key`, resolving to the number of keys removed (0 or 1).
    ///
    /// # Errors
    ///
    /// - [`PaperboyError::InvalidArgument`] if `key` is empty.
    /// - [`PaperboyError::Connection`] if the data connection is unavailable.
    /// - [`PaperboyError::StoreOperation`] if the `DEL` fails.
    pub async fn remove(&self, key: &str) -> Result<u64, PaperboyError> {
        require(key, "no key")?;

        let mut conn = self.data.acquire().await?;
        let outcome = conn.del(key).await;
        conn.release();
        let removed = outcome.map_err(|source| store_failure(Operation::Del, source))?;

        tracing::debug!(key, removed, "value removed");
        Ok(removed)
    }

    /// Publishes `payload` on channel `event`, resolving to the payload.
    ///
    /// Publishing to a channel nobody subscribes to is not an error.
    ///
    /// # Errors
    ///
    /// - [`PaperboyError::InvalidArgument`] if `event` is empty.
    /// - [`PaperboyError::Connection`] if the trigger connection is
    ///   unavailable.
    /// - [`PaperboyError::StoreOperation`] if the `PUBLISH` fails.
    pub async fn trigger(&self, event: &str, payload: &str) -> Result<String, PaperboyError> {
        require(event, "no event")?;

        let mut conn = self.trigger.acquire().await?;
        let outcome = conn.publish(event, payload).await;
        conn.release();
        let receivers = outcome.map_err(|source| store_failure(Operation::Publish, source))?;

        tracing::debug!(event, receivers, "event triggered");
        Ok(payload.to_string())
    }

    /// Calls `listener` for every future `event`.
    ///
    /// The listener is registered before the store subscription is issued,
    /// so no message published after this call resolves can be missed.
    ///
    /// # Errors
    ///
    /// - [`PaperboyError::InvalidArgument`] if `event` is empty.
    /// - [`PaperboyError::Connection`] if the subscribe connection is
    ///   unavailable.
    /// - [`PaperboyError::Subscription`] if the store rejects the
    ///   subscription.
    ///
    /// On error the registration made by this call is undone; other
    /// registrations of the same listener are left alone.
    pub async fn on(&self, event: &str, listener: &Listener) -> Result<(), PaperboyError> {
        self.listen(event, listener, false).await
    }

    /// Calls `listener` for the next `event` only.
    ///
    /// # Errors
    ///
    /// Same as [`Paperboy::on`].
    pub async fn once(&self, event: &str, listener: &Listener) -> Result<(), PaperboyError> {
        self.listen(event, listener, true).await
    }

    /// Unregisters `listener` from `event`. The store-level subscription
    /// is kept.
    pub fn remove_listener(&self, event: &str, listener: &Listener) -> bool {
        self.events.remove_listener(event, listener)
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.events.listener_count(event)
    }

    /// Events that currently have listeners.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events.event_names()
    }

    async fn listen(
        &self,
        event: &str,
        listener: &Listener,
        once: bool,
    ) -> Result<(), PaperboyError> {
        require(event, "no event")?;

        let registration = if once {
            self.events.once(event, listener.clone())
        } else {
            self.events.on(event, listener.clone())
        };

        if let Err(err) = self.subscribe_channel(event).await {
            self.events.remove_registration(event, registration);
            return Err(err);
        }
        Ok(())
    }

    async fn subscribe_channel(&self, channel: &str) -> Result<(), PaperboyError> {
        let mut conn = self.subscribe.acquire().await?;
        let outcome = conn.subscribe(channel).await;
        conn.release();

        match outcome {
            Ok(issued) => {
                tracing::debug!(event = channel, issued, "subscription confirmed");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(event = channel, error = %source, "subscription rejected");
                Err(PaperboyError::Subscription {
                    channel: channel.to_string(),
                    source,
                })
            }
        }
    }
}

impl<S: Store> fmt::Debug for Paperboy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paperboy")
            .field("connection_name", &self.connection_name)
            .field("data", &self.data)
            .field("trigger", &self.trigger)
            .field("subscribe", &self.subscribe)
            .field("events", &self.events)
            .finish()
    }
}

/// Rejects empty arguments before any connection is acquired.
fn require(value: &str, message: &str) -> Result<(), PaperboyError> {
    if value.is_empty() {
        return Err(PaperboyError::invalid(message));
    }
    Ok(())
}

fn store_failure(operation: Operation, source: StoreError) -> PaperboyError {
    tracing::warn!(%operation, error = %source, "store operation failed");
    PaperboyError::StoreOperation { operation, source }
}
