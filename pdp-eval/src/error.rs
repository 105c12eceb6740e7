//! Error types for evaluation and context construction.

use thiserror::Error;

/// Result alias for expression evaluation.
pub type EvalResult<T> = Result<T, EvaluationError>;

/// Failure while evaluating a boolean expression or a function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// Referenced attribute is absent from the request or variables.
    #[error("attribute `{path}` could not be resolved")]
    UnresolvedAttribute {
        /// Dotted path that failed to resolve.
        path: String,
    },
    /// Referenced function is not registered.
    #[error("unknown function `{name}`")]
    UnknownFunction {
        /// Fully qualified function name.
        name: String,
    },
    /// Value had an unexpected type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type description.
        expected: &'static str,
        /// Rendered offending value.
        found: String,
    },
    /// Function reported a failure.
    #[error("function `{name}` failed: {reason}")]
    Function {
        /// Function name.
        name: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl EvaluationError {
    /// Helper to construct function failures.
    #[must_use]
    pub fn function(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure while constructing an [`EvaluationContext`](crate::EvaluationContext).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Variable name collides with a subscription element.
    #[error("variable `{name}` shadows a subscription element")]
    ReservedVariable {
        /// Offending name.
        name: String,
    },
    /// Variable name is not a valid identifier.
    #[error("invalid variable name `{name}`")]
    InvalidVariableName {
        /// Offending name.
        name: String,
    },
}
