//! Shared error definitions for PDP primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the decision point.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided subscription identifier could not be parsed.
    #[error("invalid subscription id: {source}")]
    InvalidSubscriptionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Document key failed validation.
    #[error("invalid document key `{key}`: {reason}")]
    InvalidDocumentKey {
        /// The offending key.
        key: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
