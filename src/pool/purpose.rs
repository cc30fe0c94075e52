//! Pool purpose.

use std::fmt;

use serde::Serialize;

/// What a pooled connection is used for.
///
/// A connection in subscriber mode cannot issue ordinary commands, so
/// each purpose gets its own pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// `SET` / `GET` / `DEL`.
    Data,
    /// `PUBLISH`.
    Trigger,
    /// `SUBSCRIBE` and inbound channel messages.
    Subscribe,
}

impl Purpose {
    /// All purposes, in pool construction order.
    pub const ALL: [Self; 3] = [Self::Data, Self::Trigger, Self::Subscribe];

    /// Lowercase name of the purpose.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Trigger => "trigger",
            Self::Subscribe => "subscribe",
        }
    }

    /// Store-side name of the pooled connection, `@<base>-<purpose>`.
    #[must_use]
    pub fn connection_name(self, base: &str) -> String {
        format!("@{base}-{}", self.as_str())
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_names_are_namespaced() {
        assert_eq!(Purpose::Data.connection_name("orders"), "@orders-data");
        assert_eq!(
            Purpose::Subscribe.connection_name("unnamed-connection"),
            "@unnamed-connection-subscribe"
        );
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Purpose::Trigger).ok();
        assert_eq!(json.as_deref(), Some("\"trigger\""));
    }
}
