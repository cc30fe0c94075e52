//! # paperboy
//!
//! Pooled façade over a Redis-style key-value / pub-sub store.
//!
//! A [`Paperboy`] multiplexes three single-connection pools (data,
//! trigger, subscribe) behind one API, and bridges channel messages from
//! its subscriber connection into a per-instance, named-event
//! [`EventBus`].
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!     │
//!     ├── Paperboy (service/)
//!     │     push / pull / remove ──► data pool ──────┐
//!     │     trigger ──────────────► trigger pool ────┤
//!     │     on / once ────────────► subscribe pool ──┤
//!     │                                              ▼
//!     │                                     Store (store/): Redis | memory
//!     │                                              │ inbound (channel, message)
//!     ├── SubscriptionBridge (bridge.rs) ◄───────────┘
//!     │
//!     └── EventBus (domain/) ──► Listener callbacks
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use paperboy::{Listener, Paperboy, PaperboyConfig, PushOptions};
//!
//! # async fn run() -> Result<(), paperboy::PaperboyError> {
//! let paperboy = Paperboy::connect(&PaperboyConfig::new(
//!     "redis://127.0.0.1:6379",
//!     "data-example",
//! ))?;
//! paperboy.push("example", "Hello World!", PushOptions::new()).await?;
//! assert_eq!(paperboy.pull("example").await?.as_deref(), Some("Hello World!"));
//!
//! let listener = Listener::new(|data| println!("{data}"));
//! paperboy.on("my-event", &listener).await?;
//! paperboy.trigger("my-event", "Hello World!").await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod pool;
pub mod service;
pub mod store;

pub use bridge::SubscriptionBridge;
pub use config::PaperboyConfig;
pub use domain::{EventBus, Listener, ListenerId, PushOptions, RegistrationId, Reply};
pub use error::PaperboyError;
pub use pool::{PoolStatus, Purpose};
pub use service::Paperboy;
pub use store::{MemoryStore, Operation, RedisStore, Store, StoreError};
