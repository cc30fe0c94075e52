//! Domain layer: event bus, listeners, and data-operation envelopes.
//!
//! This module contains the in-process side of the facade: the per-facade
//! [`EventBus`] that fans named events out to [`Listener`]s, and the
//! option/reply types used by data operations.

pub mod event_bus;
pub mod listener;
pub mod reply;

pub use event_bus::{EventBus, RegistrationId};
pub use listener::{Listener, ListenerId};
pub use reply::{PushOptions, Reply};
