//! Connection pools.
//!
//! Three [`Pool`]s back every facade: one per [`Purpose`]. Each holds at
//! most one live connection, created lazily on first acquire and kept warm
//! for the life of the pool.

pub mod connection_pool;
pub mod factory;
pub mod purpose;

pub use connection_pool::{ConnectionFactory, Pool, PoolStatus, PooledConnection};
pub use factory::{DataFactory, SubscribeFactory, TriggerFactory};
pub use purpose::Purpose;
