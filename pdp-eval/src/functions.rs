//! Registry of named pure functions callable from expressions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{EvalResult, EvaluationError};

/// Function implementation: pure mapping from arguments to a value.
pub type Function = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// Function registry shared by every evaluation of a request.
///
/// Registration happens before the registry is shared; afterwards it is only
/// read. Replacing the registry of a running index goes through
/// `update_function_context` so that build-time folding is redone.
#[derive(Clone, Default)]
pub struct FunctionContext {
    functions: BTreeMap<String, Function>,
}

impl fmt::Debug for FunctionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionContext")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionContext {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard library:
    /// `array.contains(array, value)`, `string.starts_with(text, prefix)` and
    /// `number.greater_than(lhs, rhs)`.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_function("array.contains", |args| {
                let [array, needle] = args else {
                    return Err(arity("array.contains", 2, args.len()));
                };
                let items = array.as_array().ok_or_else(|| mismatch("array", array))?;
                Ok(Value::Bool(items.contains(needle)))
            })
            .with_function("string.starts_with", |args| {
                let [text, prefix] = args else {
                    return Err(arity("string.starts_with", 2, args.len()));
                };
                let text = text.as_str().ok_or_else(|| mismatch("string", text))?;
                let prefix = prefix.as_str().ok_or_else(|| mismatch("string", prefix))?;
                Ok(Value::Bool(text.starts_with(prefix)))
            })
            .with_function("number.greater_than", |args| {
                let [lhs, rhs] = args else {
                    return Err(arity("number.greater_than", 2, args.len()));
                };
                let lhs = lhs.as_f64().ok_or_else(|| mismatch("number", lhs))?;
                let rhs = rhs.as_f64().ok_or_else(|| mismatch("number", rhs))?;
                Ok(Value::Bool(lhs > rhs))
            })
    }

    /// Registers a function, returning the implementation it replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> Option<Function>
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function))
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Returns `true` when a function is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Iterates the registered function names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Invokes a function.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnknownFunction`] when nothing is registered
    /// under `name`, or whatever the function itself reports.
    pub fn call(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownFunction {
                name: name.to_owned(),
            })?;
        function(args)
    }
}

fn arity(name: &str, expected: usize, found: usize) -> EvaluationError {
    EvaluationError::function(name, format!("expected {expected} arguments, got {found}"))
}

fn mismatch(expected: &'static str, found: &Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_library_functions_work() {
        let functions = FunctionContext::standard();

        let result = functions
            .call("array.contains", &[json!(["a", "b"]), json!("b")])
            .unwrap();
        assert_eq!(result, json!(true));

        let result = functions
            .call("string.starts_with", &[json!("/api/x"), json!("/api")])
            .unwrap();
        assert_eq!(result, json!(true));

        let result = functions
            .call("number.greater_than", &[json!(1), json!(2)])
            .unwrap();
        assert_eq!(result, json!(false));
    }

    #[test]
    fn failures_are_reported() {
        let functions = FunctionContext::standard();

        let err = functions.call("missing.fn", &[]).unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownFunction { .. }));

        let err = functions
            .call("number.greater_than", &[json!("x"), json!(1)])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::TypeMismatch { .. }));

        let err = functions.call("array.contains", &[json!([])]).unwrap_err();
        assert!(matches!(err, EvaluationError::Function { .. }));
    }

    #[test]
    fn register_replaces_previous_implementation() {
        let mut functions = FunctionContext::new();
        assert!(functions.register("x.f", |_| Ok(json!(1))).is_none());
        assert!(functions.register("x.f", |_| Ok(json!(2))).is_some());
        assert_eq!(functions.call("x.f", &[]).unwrap(), json!(2));
        assert_eq!(functions.names().collect::<Vec<_>>(), ["x.f"]);
    }
}
