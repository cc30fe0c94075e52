//! In-process store backend.
//!
//! [`MemoryStore`] mirrors the Redis semantics the facade relies on:
//! expiring keys (measured on Tokio's clock, so paused-time tests work),
//! and channel fan-out to every subscriber connection subscribed to the
//! channel. It also exposes fault injection, artificial latency, and a few
//! counters so pool behaviour can be observed from the outside.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{
    DataConnection, MessageHandler, Operation, Store, StoreError, SubscriberConnection,
    TriggerConnection,
};
use crate::pool::Purpose;

/// Shared in-memory store. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    subscribers: HashMap<u64, SubscriberSlot>,
    next_subscriber: u64,
    latency: Duration,
    connect_failures: HashMap<Purpose, usize>,
    op_failures: VecDeque<Operation>,
    opened: HashMap<Purpose, usize>,
    in_flight: HashMap<Purpose, usize>,
    peak_in_flight: HashMap<Purpose, usize>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("entries", &self.entries.len())
            .field("subscribers", &self.subscribers.len())
            .field("opened", &self.opened)
            .finish_non_exhaustive()
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

struct SubscriberSlot {
    channels: HashSet<String>,
    on_message: MessageHandler,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next connect attempt for `purpose` fail.
    pub fn fail_next_connect(&self, purpose: Purpose) {
        *self.inner.lock().connect_failures.entry(purpose).or_default() += 1;
    }

    /// Makes the next `operation` issued on any connection fail.
    pub fn fail_next(&self, operation: Operation) {
        self.inner.lock().op_failures.push_back(operation);
    }

    /// Delays every data, publish and subscribe command by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Drops every subscriber connection on the store side, as a server
    /// restart would. The client handles stay around but are dead.
    pub fn disconnect_subscribers(&self) {
        self.inner.lock().subscribers.clear();
    }

    /// Number of connections successfully opened for `purpose`.
    #[must_use]
    pub fn connections_opened(&self, purpose: Purpose) -> usize {
        self.inner.lock().opened.get(&purpose).copied().unwrap_or(0)
    }

    /// Highest number of commands ever in flight at once on connections
    /// of `purpose`.
    #[must_use]
    pub fn peak_in_flight(&self, purpose: Purpose) -> usize {
        self.inner.lock().peak_in_flight.get(&purpose).copied().unwrap_or(0)
    }

    /// Number of subscriber connections currently subscribed to `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.lock()
            .subscribers
            .values()
            .filter(|slot| slot.channels.contains(channel))
            .count()
    }

    fn open(&self, purpose: Purpose) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        if let Some(pending) = state.connect_failures.get_mut(&purpose)
            && *pending > 0
        {
            *pending -= 1;
            return Err(StoreError::Rejected(format!(
                "connection refused ({purpose})"
            )));
        }
        *state.opened.entry(purpose).or_default() += 1;
        Ok(())
    }

    /// Runs `apply` as one command issued on a `purpose` connection,
    /// honouring latency and injected failures.
    async fn command<T>(
        &self,
        purpose: Purpose,
        operation: Operation,
        apply: impl FnOnce(&mut State) -> T,
    ) -> Result<T, StoreError> {
        let latency = {
            let mut state = self.inner.lock();
            let current = state.in_flight.entry(purpose).or_default();
            *current += 1;
            let current = *current;
            let peak = state.peak_in_flight.entry(purpose).or_default();
            *peak = (*peak).max(current);
            state.latency
        };
        let _in_flight = InFlight {
            store: self,
            purpose,
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.inner.lock();
        if let Some(pos) = state.op_failures.iter().position(|op| *op == operation) {
            state.op_failures.remove(pos);
            return Err(StoreError::Rejected(format!("injected {operation} failure")));
        }
        Ok(apply(&mut state))
    }
}

/// Decrements the in-flight counter even if the command future is dropped.
struct InFlight<'a> {
    store: &'a MemoryStore,
    purpose: Purpose,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(current) = self.store.inner.lock().in_flight.get_mut(&self.purpose) {
            *current = current.saturating_sub(1);
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Data = MemoryConnection;
    type Trigger = MemoryConnection;
    type Subscriber = MemorySubscriber;

    async fn connect_data(&self, name: &str) -> Result<Self::Data, StoreError> {
        self.open(Purpose::Data)?;
        Ok(MemoryConnection::new(self, name, Purpose::Data))
    }

    async fn connect_trigger(&self, name: &str) -> Result<Self::Trigger, StoreError> {
        self.open(Purpose::Trigger)?;
        Ok(MemoryConnection::new(self, name, Purpose::Trigger))
    }

    async fn connect_subscriber(
        &self,
        name: &str,
        on_message: MessageHandler,
    ) -> Result<Self::Subscriber, StoreError> {
        self.open(Purpose::Subscribe)?;
        let mut state = self.inner.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.insert(
            id,
            SubscriberSlot {
                channels: HashSet::new(),
                on_message,
            },
        );
        Ok(MemorySubscriber {
            store: self.clone(),
            name: name.to_string(),
            id,
        })
    }
}

/// Request/response connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    name: String,
    purpose: Purpose,
}

impl MemoryConnection {
    fn new(store: &MemoryStore, name: &str, purpose: Purpose) -> Self {
        Self {
            store: store.clone(),
            name: name.to_string(),
            purpose,
        }
    }

    /// Name the connection was opened with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DataConnection for MemoryConnection {
    async fn set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.store
            .command(self.purpose, Operation::Set, |state| {
                let expires_at = expiry.map(|ttl| Instant::now() + ttl);
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at,
                    },
                );
            })
            .await
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.store
            .command(self.purpose, Operation::Get, |state| {
                let now = Instant::now();
                let live = state
                    .entries
                    .get(key)
                    .filter(|entry| entry.is_live(now))
                    .map(|entry| entry.value.clone());
                if live.is_none() {
                    state.entries.remove(key);
                }
                live
            })
            .await
    }

    async fn del(&mut self, key: &str) -> Result<u64, StoreError> {
        self.store
            .command(self.purpose, Operation::Del, |state| {
                let now = Instant::now();
                match state.entries.remove(key) {
                    Some(entry) if entry.is_live(now) => 1,
                    _ => 0,
                }
            })
            .await
    }
}

#[async_trait]
impl TriggerConnection for MemoryConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<u64, StoreError> {
        let handlers = self
            .store
            .command(self.purpose, Operation::Publish, |state| {
                state
                    .subscribers
                    .values()
                    .filter(|slot| slot.channels.contains(channel))
                    .map(|slot| Arc::clone(&slot.on_message))
                    .collect::<Vec<_>>()
            })
            .await?;

        // Handlers run without the store lock held.
        for handler in &handlers {
            handler(channel, payload);
        }
        Ok(handlers.len() as u64)
    }
}

/// Subscriber-mode connection to a [`MemoryStore`].
///
/// Dropping it removes its subscriptions and detaches its handler.
#[derive(Debug)]
pub struct MemorySubscriber {
    store: MemoryStore,
    name: String,
    id: u64,
}

impl MemorySubscriber {
    /// Name the connection was opened with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl SubscriberConnection for MemorySubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), StoreError> {
        let id = self.id;
        let attached = self
            .store
            .command(Purpose::Subscribe, Operation::Subscribe, |state| {
                match state.subscribers.get_mut(&id) {
                    Some(slot) => {
                        slot.channels.insert(channel.to_string());
                        true
                    }
                    None => false,
                }
            })
            .await?;
        if attached {
            Ok(())
        } else {
            Err(StoreError::Rejected("subscriber connection closed".to_string()))
        }
    }

    fn is_open(&self) -> bool {
        self.store.inner.lock().subscribers.contains_key(&self.id)
    }
}

impl Drop for MemorySubscriber {
    fn drop(&mut self) {
        self.store.inner.lock().subscribers.remove(&self.id);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn set_get_del() {
        let store = MemoryStore::new();
        let Ok(mut conn) = store.connect_data("@t-data").await else {
            panic!("connect failed");
        };
        assert_ok!(conn.set("k", "v", None).await);
        assert_eq!(assert_ok!(conn.get("k").await).as_deref(), Some("v"));
        assert_eq!(assert_ok!(conn.del("k").await), 1);
        assert_eq!(assert_ok!(conn.del("k").await), 0);
        assert_eq!(assert_ok!(conn.get("k").await), None);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_on_tokio_clock() {
        let store = MemoryStore::new();
        let Ok(mut conn) = store.connect_data("@t-data").await else {
            panic!("connect failed");
        };
        assert_ok!(conn.set("k", "v", Some(Duration::from_secs(2))).await);
        tokio::time::advance(Duration::from_millis(1_900)).await;
        assert!(assert_ok!(conn.get("k").await).is_some());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(assert_ok!(conn.get("k").await).is_none());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let store = MemoryStore::new();
        store.fail_next_connect(Purpose::Data);
        assert_err!(store.connect_data("@t-data").await);
        let Ok(mut conn) = store.connect_data("@t-data").await else {
            panic!("second connect should succeed");
        };
        assert_eq!(store.connections_opened(Purpose::Data), 1);

        store.fail_next(Operation::Get);
        assert_err!(conn.get("k").await);
        assert_ok!(conn.get("k").await);
    }

    #[tokio::test]
    async fn publish_reaches_subscribed_connections_only() {
        let store = MemoryStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler: MessageHandler = Arc::new(move |channel: &str, message: &str| {
            assert_eq!(channel, "news");
            assert_eq!(message, "hello");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let Ok(mut sub) = store.connect_subscriber("@t-subscribe", handler).await else {
            panic!("connect failed");
        };
        let Ok(mut publisher) = store.connect_trigger("@t-trigger").await else {
            panic!("connect failed");
        };

        assert_eq!(assert_ok!(publisher.publish("news", "hello").await), 0);
        assert_ok!(sub.subscribe("news").await);
        assert_eq!(store.subscriber_count("news"), 1);
        assert_eq!(assert_ok!(publisher.publish("news", "hello").await), 1);
        assert_eq!(assert_ok!(publisher.publish("other", "hello").await), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(sub);
        assert_eq!(store.subscriber_count("news"), 0);
        assert_eq!(assert_ok!(publisher.publish("news", "hello").await), 0);
    }

    #[tokio::test]
    async fn disconnected_subscriber_reports_closed() {
        let store = MemoryStore::new();
        let handler: MessageHandler = Arc::new(|_: &str, _: &str| {});
        let Ok(mut sub) = store.connect_subscriber("@t-subscribe", handler).await else {
            panic!("connect failed");
        };
        assert_ok!(sub.subscribe("news").await);
        assert!(sub.is_open());

        store.disconnect_subscribers();
        assert!(!sub.is_open());
        assert_eq!(store.subscriber_count("news"), 0);
        assert_err!(sub.subscribe("news").await);
    }
}
