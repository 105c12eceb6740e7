//! Strongly typed decision point configuration.

use pdp_combinators::CombiningAlgorithm;
use pdp_eval::VariableContext;
use pdp_index::IndexType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConfigResult;

/// Configuration of an embedded decision point, usually read from
/// `pdp.json`.
///
/// ```json
/// {
///   "algorithm": "deny-overrides",
///   "variables": { "tenant": "acme" },
///   "index": "improved"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfiguration {
    algorithm: CombiningAlgorithm,
    variables: Map<String, Value>,
    index: IndexType,
}

impl PdpConfiguration {
    /// Default configuration: deny-overrides, no variables, improved index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`](crate::ConfigError::Parse) for malformed
    /// documents and [`ConfigError::Variable`](crate::ConfigError::Variable)
    /// for unbindable variable names.
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the combining algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Binds a variable visible to every evaluation.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Sets the retrieval strategy.
    #[must_use]
    pub fn with_index(mut self, index: IndexType) -> Self {
        self.index = index;
        self
    }

    /// Combining algorithm for document decisions.
    #[must_use]
    pub fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    /// Variables bound in every evaluation context.
    #[must_use]
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Retrieval strategy.
    #[must_use]
    pub fn index(&self) -> IndexType {
        self.index
    }

    /// Checks that every variable name can be bound.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Variable`](crate::ConfigError::Variable) for the
    /// first offending name.
    pub fn validate(&self) -> ConfigResult<()> {
        for name in self.variables.keys() {
            VariableContext::validate_variable(name)?;
        }
        Ok(())
    }
}
