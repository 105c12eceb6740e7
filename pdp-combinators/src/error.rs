//! Error types for the combinator crate.

use thiserror::Error;

/// Errors emitted while selecting a combining algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombinatorError {
    /// No algorithm is registered under the name.
    #[error("unknown combining algorithm `{name}`")]
    UnknownAlgorithm {
        /// Offending name.
        name: String,
    },
}
