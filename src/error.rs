//! Paperboy error types.
//!
//! [`PaperboyError`] is the error returned by every facade operation.
//! Failures that originate in the remote store keep the underlying
//! [`StoreError`] as their source so callers can always reach the
//! original cause.

use crate::pool::Purpose;
use crate::store::{Operation, StoreError};

/// Facade-level error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category                 |
/// |-----------|--------------------------|
/// | 1000–1999 | Validation / config      |
/// | 3000–3999 | Connection / store       |
/// | 4000–4999 | Subscription             |
#[derive(Debug, thiserror::Error)]
pub enum PaperboyError {
    /// A required argument was missing or empty. Raised before any
    /// connection is acquired.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pool could not create or obtain a connection.
    #[error("{purpose} connection failed: {source}")]
    Connection {
        /// Pool the connection was requested from.
        purpose: Purpose,
        /// Underlying connect failure.
        #[source]
        source: StoreError,
    },

    /// The remote operation failed after a connection was acquired.
    #[error("store {operation} failed: {source}")]
    StoreOperation {
        /// Operation that was issued.
        operation: Operation,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The store rejected a channel subscription.
    #[error("subscription to {channel:?} failed: {source}")]
    Subscription {
        /// Channel that could not be subscribed.
        channel: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Process configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaperboyError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidArgument(_) => 1001,
            Self::Configuration(_) => 1002,
            Self::Internal(_) => 3000,
            Self::Connection { .. } => 3001,
            Self::StoreOperation { .. } => 3002,
            Self::Subscription { .. } => 4001,
        }
    }

    /// Shorthand for a [`PaperboyError::InvalidArgument`].
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns `true` for [`PaperboyError::InvalidArgument`].
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
