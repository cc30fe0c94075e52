//! Listener callbacks registered on the [`super::EventBus`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`Listener`].
///
/// Clones of a listener share its identifier, which is what
/// [`super::EventBus::remove_listener`] matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Cloneable handle to a callback invoked with each event payload.
///
/// Keep a clone of the handle passed to `on`/`once` to remove it later.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Arc<dyn Fn(&str) + Send + Sync>,
}

impl Listener {
    /// Wraps `callback` in a new listener with a fresh identity.
    pub fn new(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            id: ListenerId::next(),
            callback: Arc::new(callback),
        }
    }

    /// Identifier shared by all clones of this listener.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Invokes the callback.
    pub fn call(&self, payload: &str) {
        (self.callback)(payload);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Listener::new(|_| {});
        let b = a.clone();
        let c = Listener::new(|_| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn call_passes_payload() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let listener = Listener::new(move |payload| {
            if let Ok(mut s) = sink.lock() {
                s.push_str(payload);
            }
        });
        listener.call("hello");
        let value = seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(value, "hello");
    }
}
