//! In-process registry of named-event listeners.
//!
//! [`EventBus`] maps event names to ordered listener lists. It never talks
//! to the store: store-level channel messages reach it through the
//! subscription bridge, which calls [`EventBus::emit`] with the channel
//! name as the event name.
//!
//! `emit` copies the listener list (and drops single-fire entries) while
//! holding the lock, then invokes the copy without it. Listeners may
//! therefore register or remove listeners, or emit, from inside a callback.
//! A listener that panics is logged and skipped; delivery continues with
//! the next one.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

use super::Listener;

/// Identifies one registration made with [`EventBus::on`] or
/// [`EventBus::once`].
///
/// Registering the same listener twice yields two distinct ids, so
/// [`EventBus::remove_registration`] undoes exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registration-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Registration {
    id: RegistrationId,
    listener: Listener,
    once: bool,
}

#[derive(Debug, Default)]
struct Registry {
    events: HashMap<String, Vec<Registration>>,
    next_id: u64,
}

impl Registry {
    /// Removes the first registration of `event` matching `matches`.
    fn remove_where(
        &mut self,
        event: &str,
        matches: impl Fn(&Registration) -> bool,
        newest_first: bool,
    ) -> Option<Registration> {
        let registrations = self.events.get_mut(event)?;
        let pos = if newest_first {
            registrations.iter().rposition(matches)?
        } else {
            registrations.iter().position(matches)?
        };
        let removed = registrations.remove(pos);
        if registrations.is_empty() {
            self.events.remove(event);
        }
        Some(removed)
    }
}

/// Per-facade listener registry. Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, event: &str, listener: Listener, once: bool) -> RegistrationId {
        let mut registry = self.registry.write();
        registry.next_id += 1;
        let id = RegistrationId(registry.next_id);
        tracing::debug!(event, listener = %listener.id(), %id, once, "listener registered");
        registry
            .events
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, listener, once });
        id
    }

    /// Registers `listener` for every future `event`.
    pub fn on(&self, event: &str, listener: Listener) -> RegistrationId {
        self.register(event, listener, false)
    }

    /// Registers `listener` for the next `event` only.
    pub fn once(&self, event: &str, listener: Listener) -> RegistrationId {
        self.register(event, listener, true)
    }

    /// Delivers `payload` to the listeners of `event` in registration order.
    ///
    /// Returns the number of listeners that completed without panicking.
    /// An event without listeners is a no-op returning `0`.
    pub fn emit(&self, event: &str, payload: &str) -> usize {
        let snapshot: Vec<Listener> = {
            let mut registry = self.registry.write();
            let Some(registrations) = registry.events.get_mut(event) else {
                return 0;
            };
            let snapshot = registrations
                .iter()
                .map(|r| r.listener.clone())
                .collect();
            registrations.retain(|r| !r.once);
            if registrations.is_empty() {
                registry.events.remove(event);
            }
            snapshot
        };

        let mut delivered = 0;
        for listener in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.call(payload))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(event, listener = %listener.id(), "listener panicked");
                }
            }
        }
        tracing::trace!(event, delivered, "event emitted");
        delivered
    }

    /// Removes the most recently added registration of `listener` for
    /// `event`. Returns `false` if it was not registered.
    pub fn remove_listener(&self, event: &str, listener: &Listener) -> bool {
        let id = listener.id();
        let removed = self
            .registry
            .write()
            .remove_where(event, |r| r.listener.id() == id, true);
        if removed.is_some() {
            tracing::debug!(event, listener = %id, "listener removed");
        }
        removed.is_some()
    }

    /// Removes the single registration `id` made for `event`. Returns
    /// `false` if it already fired (for `once`) or was removed.
    pub fn remove_registration(&self, event: &str, id: RegistrationId) -> bool {
        let removed = self
            .registry
            .write()
            .remove_where(event, |r| r.id == id, false);
        if let Some(registration) = &removed {
            tracing::debug!(
                event,
                listener = %registration.listener.id(),
                %id,
                "registration removed"
            );
        }
        removed.is_some()
    }

    /// Number of listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.read().events.get(event).map_or(0, Vec::len)
    }

    /// Names of events with at least one listener, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().events.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);
        let make = move |tag: &str| {
            let log = Arc::clone(&shared);
            let tag = tag.to_string();
            Listener::new(move |payload| {
                if let Ok(mut log) = log.lock() {
                    log.push(format!("{tag}:{payload}"));
                }
            })
        };
        (log, make)
    }

    fn entries(log: &Mutex<Vec<String>>) -> Vec<String> {
        log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nothing", "x"), 0);
        assert_eq!(bus.listener_count("nothing"), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on("ev", make("a"));
        bus.on("ev", make("b"));
        bus.once("ev", make("c"));

        assert_eq!(bus.emit("ev", "1"), 3);
        assert_eq!(entries(&log), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.once("ev", make("once"));
        assert_eq!(bus.listener_count("ev"), 1);

        bus.emit("ev", "1");
        bus.emit("ev", "2");
        assert_eq!(entries(&log), vec!["once:1"]);
        assert_eq!(bus.listener_count("ev"), 0);
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn on_listeners_persist() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on("ev", make("a"));
        bus.on("ev", make("b"));
        assert_eq!(bus.listener_count("ev"), 2);
        bus.emit("ev", "x");
        assert_eq!(bus.listener_count("ev"), 2);
        assert_eq!(entries(&log).len(), 2);
    }

    #[test]
    fn remove_listener_drops_latest_registration() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        bus.on("ev", a.clone());
        bus.on("ev", a.clone());
        assert!(bus.remove_listener("ev", &a));
        assert_eq!(bus.listener_count("ev"), 1);
        assert!(bus.remove_listener("ev", &a));
        assert!(!bus.remove_listener("ev", &a));
        bus.emit("ev", "x");
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn remove_registration_targets_one_registration() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let first = bus.once("ev", a.clone());
        let second = bus.on("ev", a.clone());
        assert_ne!(first, second);

        // Undoing the older registration leaves the newer one in place.
        assert!(bus.remove_registration("ev", first));
        assert!(!bus.remove_registration("ev", first));
        assert_eq!(bus.listener_count("ev"), 1);

        bus.emit("ev", "1");
        bus.emit("ev", "2");
        assert_eq!(entries(&log), vec!["a:1", "a:2"]);

        assert!(bus.remove_registration("ev", second));
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn fired_once_registration_cannot_be_removed() {
        let bus = EventBus::new();
        let id = bus.once("ev", Listener::new(|_| {}));
        assert_eq!(bus.emit("ev", "x"), 1);
        assert!(!bus.remove_registration("ev", id));
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on("ev", Listener::new(|_| panic!("boom")));
        bus.on("ev", make("after"));

        assert_eq!(bus.emit("ev", "x"), 1);
        assert_eq!(entries(&log), vec!["after:x"]);
        assert_eq!(bus.listener_count("ev"), 2);
    }

    #[test]
    fn listeners_may_mutate_bus_during_emit() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let late = make("late");
        let inner_bus = bus.clone();
        bus.on(
            "ev",
            Listener::new(move |_| {
                inner_bus.on("ev", late.clone());
            }),
        );

        // The listener added mid-dispatch is not part of this emit.
        assert_eq!(bus.emit("ev", "1"), 1);
        assert!(entries(&log).is_empty());
        assert_eq!(bus.listener_count("ev"), 2);

        bus.emit("ev", "2");
        assert_eq!(entries(&log), vec!["late:2"]);
    }

    #[test]
    fn event_names_are_sorted() {
        let bus = EventBus::new();
        bus.on("b", Listener::new(|_| {}));
        bus.on("a", Listener::new(|_| {}));
        assert_eq!(bus.event_names(), vec!["a", "b"]);
    }
}
