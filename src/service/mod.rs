//! Service layer: the [`Paperboy`] facade.
//!
//! Orchestrates pool acquire/release around each store command and wires
//! listener registration through the event bus and subscription bridge.

pub mod paperboy;

pub use paperboy::Paperboy;
