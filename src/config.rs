//! Paperboy configuration loaded from environment variables.
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file via `dotenvy`.

use crate::error::PaperboyError;

/// Connection name used when none is configured.
pub const DEFAULT_CONNECTION_NAME: &str = "unnamed-connection";

/// Environment variable holding the store URL.
pub const REDIS_URL_VAR: &str = "PAPERBOY_REDIS_URL";

/// Environment variable holding the connection name.
pub const CONNECTION_NAME_VAR: &str = "PAPERBOY_CONNECTION_NAME";

/// Top-level configuration for a [`crate::Paperboy`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperboyConfig {
    /// Store URL, e.g. `redis://127.0.0.1:6379`.
    pub redis_url: String,

    /// Identifier used to name the three pooled connections on the store
    /// side (`@<name>-data`, `@<name>-trigger`, `@<name>-subscribe`).
    pub connection_name: String,
}

impl PaperboyConfig {
    /// Builds a configuration from explicit values.
    #[must_use]
    pub fn new(redis_url: impl Into<String>, connection_name: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            connection_name: connection_name.into(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`PaperboyError::Configuration`] if `PAPERBOY_REDIS_URL` is
    /// not set or is blank.
    pub fn from_env() -> Result<Self, PaperboyError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PaperboyError> {
        let redis_url = lookup(REDIS_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PaperboyError::Configuration(format!("{REDIS_URL_VAR} is not set")))?;

        let connection_name = lookup(CONNECTION_NAME_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONNECTION_NAME.to_string());

        Ok(Self {
            redis_url,
            connection_name,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let result = PaperboyConfig::from_lookup(lookup_from(&[]));
        let Err(PaperboyError::Configuration(message)) = result else {
            panic!("expected configuration error");
        };
        assert!(message.contains(REDIS_URL_VAR));
    }

    #[test]
    fn connection_name_defaults() {
        let Ok(config) =
            PaperboyConfig::from_lookup(lookup_from(&[(REDIS_URL_VAR, "redis://localhost")]))
        else {
            panic!("expected config");
        };
        assert_eq!(config.connection_name, DEFAULT_CONNECTION_NAME);
        assert_eq!(config.redis_url, "redis://localhost");
    }

    #[test]
    fn explicit_connection_name_is_used() {
        let Ok(config) = PaperboyConfig::from_lookup(lookup_from(&[
            (REDIS_URL_VAR, "redis://localhost"),
            (CONNECTION_NAME_VAR, "billing"),
        ])) else {
            panic!("expected config");
        };
        assert_eq!(config, PaperboyConfig::new("redis://localhost", "billing"));
    }
}
