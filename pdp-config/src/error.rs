//! Error types for configuration loading.

use std::path::PathBuf;

use pdp_eval::ContextError;
use thiserror::Error;

/// Errors emitted while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Configuration document is not valid JSON for the schema.
    #[error("invalid configuration document: {source}")]
    Parse {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
    /// A configured variable name cannot be bound.
    #[error("invalid configuration variable: {source}")]
    Variable {
        /// Source [`ContextError`].
        #[from]
        source: ContextError,
    },
    /// Path starts with `~` but cannot be expanded.
    #[error("cannot expand home directory in `{path}`")]
    HomeDirectory {
        /// Path as given.
        path: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
