//! Error types for the retrieval index.

use thiserror::Error;

/// Errors emitted while compiling documents or publishing index snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Disjunctive normal form of a target exceeded the clause limit.
    #[error("target of `{document}` expands to more than {limit} conjunctions")]
    FormulaTooLarge {
        /// Name of the rejected document.
        document: String,
        /// Configured clause limit.
        limit: usize,
    },
    /// A freshly built snapshot violated a structural invariant.
    #[error("index corrupted: {reason}")]
    Corrupted {
        /// Human-readable description of the violation.
        reason: String,
    },
}

impl IndexError {
    /// Helper to construct corruption errors from string-like values.
    #[must_use]
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
