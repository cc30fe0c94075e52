//! Single-connection pool with FIFO acquisition.
//!
//! [`Pool`] keeps its connection in a slot guarded by a
//! [`tokio::sync::Mutex`], whose waiters are served in arrival order. The
//! slot starts empty (`min = 0`) and holds at most one connection
//! (`max = 1`); the first acquirer to find it empty creates the connection
//! through the pool's [`ConnectionFactory`].
//!
//! # Release
//!
//! [`Pool::acquire`] returns a [`PooledConnection`] guard. The connection
//! goes back to the pool when the guard is released or dropped, so every
//! exit path returns it, including a caller's future being cancelled by a
//! timeout. The pool never closes a working connection; one the factory
//! reports as dead is dropped on the next acquire and replaced.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};

use super::Purpose;
use crate::error::PaperboyError;
use crate::store::StoreError;

/// Creates connections for one pool purpose.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Connection: Send + Sync + 'static;

    /// Purpose of the connections this factory creates.
    const PURPOSE: Purpose;

    /// Opens a new connection named `name`.
    async fn create(&self, name: &str) -> Result<Self::Connection, StoreError>;

    /// Whether a previously created connection can still serve requests.
    fn is_live(&self, _connection: &Self::Connection) -> bool {
        true
    }
}

/// Lazily populated pool holding at most one connection.
pub struct Pool<F: ConnectionFactory> {
    name: String,
    factory: F,
    slot: Arc<Mutex<Option<F::Connection>>>,
    live: AtomicBool,
    created: AtomicU64,
    waiting: AtomicUsize,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Pool purpose.
    pub purpose: Purpose,
    /// Store-side connection name.
    pub connection_name: String,
    /// Whether the connection has been created.
    pub live: bool,
    /// Whether the connection is currently checked out.
    pub in_use: bool,
    /// Connections created over the pool's lifetime.
    pub created: u64,
    /// Acquirers queued behind the current holder.
    pub waiting: usize,
}

impl<F: ConnectionFactory> Pool<F> {
    /// Creates an empty pool. No connection is opened until the first
    /// [`Pool::acquire`].
    #[must_use]
    pub fn new(factory: F, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory,
            slot: Arc::new(Mutex::new(None)),
            live: AtomicBool::new(false),
            created: AtomicU64::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Pool purpose.
    #[must_use]
    pub const fn purpose(&self) -> Purpose {
        F::PURPOSE
    }

    /// Store-side connection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrows the pool's connection, creating it if none exists yet.
    ///
    /// Waits in FIFO order while another caller holds the connection.
    ///
    /// # Errors
    ///
    /// Returns [`PaperboyError::Connection`] if the connection had to be
    /// created (first use, or the previous one died) and the factory
    /// failed. The failure is not cached: the next acquirer in line
    /// retries the creation.
    pub async fn acquire(&self) -> Result<PooledConnection<F::Connection>, PaperboyError> {
        let mut slot = {
            let _queued = Queued::enter(&self.waiting);
            Arc::clone(&self.slot).lock_owned().await
        };

        let dead = (*slot)
            .as_ref()
            .is_some_and(|conn| !self.factory.is_live(conn));
        if dead {
            tracing::warn!(
                connection = %self.name,
                purpose = %F::PURPOSE,
                "discarding dead pooled connection"
            );
            *slot = None;
            self.live.store(false, Ordering::SeqCst);
        }

        if slot.is_none() {
            tracing::debug!(
                connection = %self.name,
                purpose = %F::PURPOSE,
                "creating pooled connection"
            );
            match self.factory.create(&self.name).await {
                Ok(conn) => {
                    *slot = Some(conn);
                    self.live.store(true, Ordering::SeqCst);
                    let created = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(
                        connection = %self.name,
                        purpose = %F::PURPOSE,
                        created,
                        "pooled connection created"
                    );
                }
                Err(source) => {
                    tracing::warn!(
                        connection = %self.name,
                        purpose = %F::PURPOSE,
                        error = %source,
                        "failed to create pooled connection"
                    );
                    return Err(PaperboyError::Connection {
                        purpose: F::PURPOSE,
                        source,
                    });
                }
            }
        }

        let guard = OwnedMutexGuard::try_map(slot, Option::as_mut).map_err(|_| {
            PaperboyError::Internal(format!("{} pool slot empty after creation", F::PURPOSE))
        })?;
        tracing::trace!(connection = %self.name, "connection acquired");

        Ok(PooledConnection {
            guard,
            purpose: F::PURPOSE,
        })
    }

    /// Returns a connection to the pool. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection<F::Connection>) {
        conn.release();
    }

    /// Returns a snapshot of the pool's state.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            purpose: F::PURPOSE,
            connection_name: self.name.clone(),
            live: self.live.load(Ordering::SeqCst),
            in_use: self.slot.try_lock().is_err(),
            created: self.created.load(Ordering::SeqCst),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("purpose", &F::PURPOSE)
            .field("name", &self.name)
            .field("created", &self.created.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Counts a queued acquirer until it gets the slot or gives up.
struct Queued<'a>(&'a AtomicUsize);

impl<'a> Queued<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A connection borrowed from a [`Pool`].
///
/// Dereferences to the connection. Returned to the pool on
/// [`PooledConnection::release`] or drop.
pub struct PooledConnection<C: Send + Sync + 'static> {
    guard: OwnedMappedMutexGuard<Option<C>, C>,
    purpose: Purpose,
}

impl<C: Send + Sync + 'static> PooledConnection<C> {
    /// Purpose of the pool this connection belongs to.
    #[must_use]
    pub const fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// Hands the connection back to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<C: Send + Sync + 'static> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}

impl<C: Send + Sync + 'static> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.guard
    }
}

impl<C: Send + Sync + 'static> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        tracing::trace!(purpose = %self.purpose, "connection released");
    }
}

impl<C: Send + Sync + 'static> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}
