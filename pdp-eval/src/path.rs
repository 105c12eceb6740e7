//! Dotted attribute paths such as `subject.role` or `resource.owners.0`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{ContextError, VariableContext};

/// Path into the subscription elements or the bound variables.
///
/// The first segment names a subscription element or a variable; the
/// remaining segments select object keys, or array positions when numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    root: String,
    steps: Vec<String>,
}

impl AttributePath {
    /// Creates a path from a root and selection steps.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidVariableName`] when the root is not a
    /// valid identifier.
    pub fn new<I, S>(root: impl Into<String>, steps: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = root.into();
        VariableContext::validate_name(&root)?;
        Ok(Self {
            root,
            steps: steps.into_iter().map(Into::into).collect(),
        })
    }

    /// Returns the root segment.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the selection steps after the root.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Resolves the path, returning `None` when any segment is absent.
    #[must_use]
    pub fn resolve<'a>(&self, variables: &'a VariableContext) -> Option<&'a Value> {
        let mut current = variables.get(&self.root)?;
        for step in &self.steps {
            current = match current {
                Value::Object(map) => map.get(step)?,
                Value::Array(items) => items.get(step.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for step in &self.steps {
            write!(f, ".{step}")?;
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('.');
        let root = segments.next().unwrap_or_default();
        Self::new(root, segments)
    }
}
