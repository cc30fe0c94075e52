//! Request options and reply envelopes for data operations.

use std::time::Duration;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Recognized options for [`crate::Paperboy::push`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Time after which the stored value expires. `None` keeps it forever.
    pub expire: Option<Duration>,
}

impl PushOptions {
    /// Stores the value without expiration.
    #[must_use]
    pub const fn new() -> Self {
        Self { expire: None }
    }

    /// Expires the value after `seconds` seconds.
    #[must_use]
    pub const fn expire_in_seconds(seconds: u64) -> Self {
        Self::expire_in(Duration::from_secs(seconds))
    }

    /// Expires the value after `ttl`.
    #[must_use]
    pub const fn expire_in(ttl: Duration) -> Self {
        Self { expire: Some(ttl) }
    }
}

/// Envelope returned by [`crate::Paperboy::push`], mapping the written key
/// to the value that was stored.
///
/// Serializes as a single-entry object, `{ "<key>": "<value>" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    key: String,
    value: String,
}

impl Reply {
    /// Creates an envelope for `key` / `value`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Key that was written.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value that was written.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Looks a key up in the envelope.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        (self.key == key).then_some(self.value.as_str())
    }

    /// Splits the envelope into `(key, value)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.key, self.value)
    }
}

impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}
