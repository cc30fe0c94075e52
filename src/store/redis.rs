//! Redis backend.
//!
//! Data and trigger connections are [`ConnectionManager`]s, which
//! reconnect transparently, so a pooled connection stays usable for the
//! life of the process. The subscriber is an async `PubSub` connection
//! split into a command sink and a message stream; a forwarder task
//! drains the stream into the installed [`MessageHandler`].
//!
//! When the pub/sub stream ends (server restart, dropped socket) the
//! forwarder exits and the subscriber reports itself closed. It is not
//! reconnected in place: the subscribe pool replaces it on the next
//! acquire and re-joins the channels that still have listeners.
//!
//! # Connection names
//!
//! `CLIENT SETNAME` is issued once, when a data or trigger connection is
//! opened. If the [`ConnectionManager`] later reconnects on its own, the
//! new socket is anonymous on the server until the facade is recreated.
//! The subscriber is never named: a RESP2 connection in subscriber mode
//! rejects `CLIENT SETNAME`, and the pub/sub handle accepts no other
//! commands before subscribing.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink};
use redis::{AsyncCommands, Client};
use tokio::task::JoinHandle;

use super::{
    DataConnection, MessageHandler, Store, StoreError, SubscriberConnection, TriggerConnection,
};

/// Store backed by a Redis server.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Creates a store for the given URL. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] if the URL cannot be parsed.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self { client })
    }

    async fn named_manager(&self, name: &str) -> Result<ConnectionManager, StoreError> {
        let mut conn = self.client.get_connection_manager().await?;
        let _: () = redis::cmd("CLIENT")
            .arg("SETNAME")
            .arg(name)
            .query_async(&mut conn)
            .await?;
        tracing::debug!(connection = name, "redis connection named");
        Ok(conn)
    }
}

#[async_trait]
impl Store for RedisStore {
    type Data = RedisConnection;
    type Trigger = RedisConnection;
    type Subscriber = RedisSubscriber;

    async fn connect_data(&self, name: &str) -> Result<Self::Data, StoreError> {
        Ok(RedisConnection {
            conn: self.named_manager(name).await?,
        })
    }

    async fn connect_trigger(&self, name: &str) -> Result<Self::Trigger, StoreError> {
        Ok(RedisConnection {
            conn: self.named_manager(name).await?,
        })
    }

    async fn connect_subscriber(
        &self,
        name: &str,
        on_message: MessageHandler,
    ) -> Result<Self::Subscriber, StoreError> {
        let pubsub = self.client.get_async_pubsub().await?;
        let (sink, mut stream) = pubsub.split();

        let connection = name.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let channel = msg.get_channel_name();
                match msg.get_payload::<String>() {
                    Ok(payload) => on_message(channel, &payload),
                    Err(err) => tracing::warn!(
                        %connection,
                        channel,
                        error = %err,
                        "dropping undecodable pub/sub message"
                    ),
                }
            }
            tracing::warn!(%connection, "subscriber stream closed");
        });

        Ok(RedisSubscriber { sink, forwarder })
    }
}

/// Redis request/response connection, used for both data and trigger pools.
#[derive(Clone)]
pub struct RedisConnection {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl DataConnection for RedisConnection {
    async fn set(
        &mut self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = expiry {
            if ttl.subsec_nanos() == 0 {
                cmd.arg("EX").arg(ttl.as_secs());
            } else {
                cmd.arg("PX")
                    .arg(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
            }
        }
        let _: () = cmd.query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self.conn.get(key).await?;
        Ok(value)
    }

    async fn del(&mut self, key: &str) -> Result<u64, StoreError> {
        let removed: u64 = self.conn.del(key).await?;
        Ok(removed)
    }
}

#[async_trait]
impl TriggerConnection for RedisConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<u64, StoreError> {
        let receivers: u64 = self.conn.publish(channel, payload).await?;
        Ok(receivers)
    }
}

/// Redis connection in subscriber mode.
///
/// Open while its forwarder task runs. Dropping it aborts the forwarder,
/// detaching the message handler.
pub struct RedisSubscriber {
    sink: PubSubSink,
    forwarder: JoinHandle<()>,
}

impl fmt::Debug for RedisSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSubscriber")
            .field("forwarding", &!self.forwarder.is_finished())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SubscriberConnection for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), StoreError> {
        if !self.is_open() {
            return Err(StoreError::Rejected(
                "subscriber connection closed".to_string(),
            ));
        }
        self.sink.subscribe(channel).await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.forwarder.is_finished()
    }
}

impl Drop for RedisSubscriber {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_malformed_urls() {
        assert!(RedisStore::open("not a url").is_err());
    }

    #[test]
    fn open_accepts_redis_urls_without_connecting() {
        assert!(RedisStore::open("redis://127.0.0.1:1/").is_ok());
    }
}
