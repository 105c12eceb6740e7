//! Boolean expression contract and the built-in leaf expressions.

use std::fmt;

use serde_json::Value;

use crate::{AttributePath, EvalResult, EvaluationContext, EvaluationError};

/// Opaque boolean-valued expression, the leaf of every target expression.
///
/// Evaluation yields `true`, `false` or an [`EvaluationError`]; there is no
/// silent default. Implementations are immutable after construction.
pub trait Bool: fmt::Debug + Send + Sync {
    /// Evaluates the expression under the supplied context.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the expression cannot be decided.
    fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult<bool>;

    /// Structural identity. Two expressions with equal keys must evaluate
    /// identically under every context; the index shares one predicate per
    /// key.
    fn structural_key(&self) -> String;

    /// Returns `true` when the result does not depend on the request, so it
    /// may be computed once with only the function registry bound.
    fn is_immutable(&self) -> bool {
        false
    }
}

/// Literal `true` or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub bool);

impl Bool for Constant {
    fn evaluate(&self, _ctx: &EvaluationContext) -> EvalResult<bool> {
        Ok(self.0)
    }

    fn structural_key(&self) -> String {
        format!("const:{}", self.0)
    }

    fn is_immutable(&self) -> bool {
        true
    }
}

/// Tests an attribute for equality with an expected JSON value.
///
/// Fails with [`EvaluationError::UnresolvedAttribute`] when the attribute is
/// absent: an absent attribute is unknown, not unequal.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEquals {
    path: AttributePath,
    expected: Value,
}

impl AttributeEquals {
    /// Creates the test.
    #[must_use]
    pub fn new(path: AttributePath, expected: Value) -> Self {
        Self { path, expected }
    }

    /// Returns the tested path.
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.path
    }
}

impl Bool for AttributeEquals {
    fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult<bool> {
        let actual =
            self.path
                .resolve(ctx.variables())
                .ok_or_else(|| EvaluationError::UnresolvedAttribute {
                    path: self.path.to_string(),
                })?;
        Ok(actual == &self.expected)
    }

    fn structural_key(&self) -> String {
        format!("eq:{}=={}", self.path, self.expected)
    }
}

/// Argument of a [`FunctionPredicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Value resolved from the request or variables at evaluation time.
    Attribute(AttributePath),
    /// Constant value.
    Literal(Value),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(path) => write!(f, "{path}"),
            Self::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// Calls a registered function and requires a boolean result.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPredicate {
    function: String,
    args: Vec<Argument>,
}

impl FunctionPredicate {
    /// Creates the call.
    #[must_use]
    pub fn new(function: impl Into<String>, args: Vec<Argument>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }

    /// Returns the called function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }
}

impl Bool for FunctionPredicate {
    fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult<bool> {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Argument::Literal(value) => Ok(value.clone()),
                Argument::Attribute(path) => path
                    .resolve(ctx.variables())
                    .cloned()
                    .ok_or_else(|| EvaluationError::UnresolvedAttribute {
                        path: path.to_string(),
                    }),
            })
            .collect::<EvalResult<Vec<_>>>()?;

        match ctx.functions().call(&self.function, &args)? {
            Value::Bool(result) => Ok(result),
            other => Err(EvaluationError::TypeMismatch {
                expected: "boolean",
                found: other.to_string(),
            }),
        }
    }

    fn structural_key(&self) -> String {
        let args = self
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("fn:{}({args})", self.function)
    }

    fn is_immutable(&self) -> bool {
        self.args
            .iter()
            .all(|arg| matches!(arg, Argument::Literal(_)))
    }
}
