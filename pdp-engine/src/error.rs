//! Error types surfaced by the decision point.

use pdp_config::ConfigError;
use pdp_eval::ContextError;
use pdp_index::IndexError;
use thiserror::Error;

/// Errors emitted by [`EmbeddedPolicyDecisionPoint`](crate::EmbeddedPolicyDecisionPoint).
#[derive(Debug, Error)]
pub enum PdpError {
    /// The subscription cannot be evaluated under the current variables.
    #[error("invalid evaluation context: {source}")]
    Context {
        /// Source [`ContextError`].
        #[from]
        source: ContextError,
    },
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {source}")]
    Config {
        /// Source [`ConfigError`].
        #[from]
        source: ConfigError,
    },
    /// The document index rejected an update.
    #[error("index error: {source}")]
    Index {
        /// Source [`IndexError`].
        #[from]
        source: IndexError,
    },
}

/// Result type alias for decision point operations.
pub type PdpResult<T> = Result<T, PdpError>;
