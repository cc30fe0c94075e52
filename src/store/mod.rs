//! Narrow interface to the remote key-value / pub-sub store.
//!
//! A [`Store`] hands out one connection type per pool purpose. Data
//! connections answer request/response commands, trigger connections
//! publish, and subscriber connections accumulate channel subscriptions
//! and report every inbound message through the [`MessageHandler`] given
//! to them at connect time.

pub mod memory;
pub mod redis;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Callback invoked with `(channel, message)` for every message a
/// subscriber connection receives.
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Failure reported by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error from the Redis client.
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    /// The store refused the request.
    #[error("{0}")]
    Rejected(String),
}

/// Store commands issued by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `SET key value [EX|PX ttl]`
    Set,
    /// `GET key`
    Get,
    /// `DEL key`
    Del,
    /// `PUBLISH channel payload`
    Publish,
    /// `SUBSCRIBE channel`
    Subscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Set => "set",
            Self::Get => "get",
            Self::Del => "del",
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
        };
        f.write_str(name)
    }
}

/// Plain request/response connection.
#[async_trait]
pub trait DataConnection: Send + Sync + 'static {
    /// Stores `value` under `key`, optionally expiring after `expiry`.
    async fn set(&mut self, key: &str, value: &str, expiry: Option<Duration>)
    -> Result<(), StoreError>;

    /// Reads `key`; `None` when it does not exist or has expired.
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deletes `key`, returning how many keys were removed.
    async fn del(&mut self, key: &str) -> Result<u64, StoreError>;
}

/// Connection able to publish on channels.
#[async_trait]
pub trait TriggerConnection: Send + Sync + 'static {
    /// Publishes `payload` on `channel`, returning the number of store-side
    /// subscribers that received it.
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<u64, StoreError>;
}

/// Connection in subscriber mode.
#[async_trait]
pub trait SubscriberConnection: Send + Sync + 'static {
    /// Subscribes to `channel`, resolving once the store acknowledged it.
    async fn subscribe(&mut self, channel: &str) -> Result<(), StoreError>;

    /// Whether the connection is still receiving messages. Once this turns
    /// `false` the connection stays dead and its subscriptions are gone.
    fn is_open(&self) -> bool {
        true
    }
}

/// A backend able to open connections for each pool purpose.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Connection type used by the data pool.
    type Data: DataConnection;
    /// Connection type used by the trigger pool.
    type Trigger: TriggerConnection;
    /// Connection type used by the subscribe pool.
    type Subscriber: SubscriberConnection;

    /// Opens a data connection named `name`.
    async fn connect_data(&self, name: &str) -> Result<Self::Data, StoreError>;

    /// Opens a trigger connection named `name`.
    async fn connect_trigger(&self, name: &str) -> Result<Self::Trigger, StoreError>;

    /// Opens a subscriber connection named `name` whose inbound messages
    /// are reported to `on_message` until the connection is dropped.
    async fn connect_subscriber(
        &self,
        name: &str,
        on_message: MessageHandler,
    ) -> Result<Self::Subscriber, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_display_as_commands() {
        assert_eq!(Operation::Set.to_string(), "set");
        assert_eq!(Operation::Publish.to_string(), "publish");
        assert_eq!(Operation::Subscribe.to_string(), "subscribe");
    }
}
