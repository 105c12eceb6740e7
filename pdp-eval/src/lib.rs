//! Evaluation capabilities consumed by the retrieval and combination engine.
//!
//! The engine treats target expressions and policy bodies as opaque
//! capabilities: a [`Bool`] evaluates to `true`, `false` or an error, and a
//! [`PolicyBody`] produces a continuous [`DecisionStream`]. This crate defines
//! those contracts together with the immutable [`EvaluationContext`] passed
//! through every evaluation, plus a handful of concrete leaves and bodies for
//! embedding and testing.

#![warn(missing_docs, clippy::pedantic)]

mod body;
mod context;
mod error;
mod expression;
mod functions;
mod path;

pub use body::{ConditionalBody, DecisionStream, PolicyBody, StaticBody};
pub use context::{EvaluationContext, VariableContext};
pub use error::{ContextError, EvalResult, EvaluationError};
pub use expression::{Argument, AttributeEquals, Bool, Constant, FunctionPredicate};
pub use functions::{Function, FunctionContext};
pub use path::AttributePath;
