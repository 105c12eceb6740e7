//! Immutable per-request evaluation context.

use std::collections::BTreeMap;
use std::sync::Arc;

use pdp_primitives::AuthorizationSubscription;
use serde_json::{Map, Value};

use crate::{ContextError, FunctionContext};

/// Variable bindings visible to expressions: the four subscription elements
/// plus the configured variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    values: BTreeMap<String, Value>,
}

impl VariableContext {
    /// Binds the subscription elements and the supplied variables.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidVariableName`] when a variable name is
    /// not an identifier and [`ContextError::ReservedVariable`] when it would
    /// shadow a subscription element.
    pub fn new(
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
    ) -> Result<Self, ContextError> {
        let mut values = BTreeMap::new();
        for name in AuthorizationSubscription::ELEMENTS {
            if let Some(value) = subscription.element(name) {
                values.insert(name.to_owned(), value.clone());
            }
        }

        for (name, value) in variables {
            Self::validate_variable(name)?;
            values.insert(name.clone(), value.clone());
        }

        Ok(Self { values })
    }

    /// Checks that `name` is an identifier: a letter or `_` followed by
    /// letters, digits or `_`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidVariableName`] otherwise.
    pub fn validate_name(name: &str) -> Result<(), ContextError> {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ContextError::InvalidVariableName {
                name: name.to_owned(),
            })
        }
    }

    /// Checks that `name` may be bound as a configured variable.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`VariableContext::new`].
    pub fn validate_variable(name: &str) -> Result<(), ContextError> {
        Self::validate_name(name)?;
        if AuthorizationSubscription::ELEMENTS.contains(&name) {
            return Err(ContextError::ReservedVariable {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Looks up a bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Everything an expression or policy body needs to evaluate: the function
/// registry and the variable bindings.
///
/// Built once per request and shared behind an [`Arc`] by every evaluation
/// of that request.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    functions: Arc<FunctionContext>,
    variables: VariableContext,
}

impl EvaluationContext {
    /// Constructs the context for a subscription.
    ///
    /// # Errors
    ///
    /// Propagates [`ContextError`] from variable validation.
    pub fn new(
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
        functions: Arc<FunctionContext>,
    ) -> Result<Self, ContextError> {
        Ok(Self {
            functions,
            variables: VariableContext::new(subscription, variables)?,
        })
    }

    /// Context with no request bound, used to fold request-independent
    /// expressions ahead of time.
    #[must_use]
    pub fn for_functions(functions: Arc<FunctionContext>) -> Self {
        Self {
            functions,
            variables: VariableContext::default(),
        }
    }

    /// Returns the function registry.
    #[must_use]
    pub fn functions(&self) -> &FunctionContext {
        &self.functions
    }

    /// Returns the variable bindings.
    #[must_use]
    pub fn variables(&self) -> &VariableContext {
        &self.variables
    }
}
