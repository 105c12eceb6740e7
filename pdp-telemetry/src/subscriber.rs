//! Structured tracing setup.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors emitted while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The default filter directive could not be parsed.
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {reason}")]
    AlreadyInstalled {
        /// Message reported by the registry.
        reason: String,
    },
}

/// Result type alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Options for [`init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// Directive used when `RUST_LOG` is unset, e.g. `info,pdp_index=debug`.
    pub default_directive: String,
    /// Include the event target (module path) in every line.
    pub with_target: bool,
    /// Use the compact line format.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_owned(),
            with_target: false,
            compact: false,
        }
    }
}

impl TelemetryConfig {
    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Builds the filter: `RUST_LOG` when set, the default directive otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Filter`] when the default directive is
    /// malformed.
    pub fn filter(&self) -> TelemetryResult<EnvFilter> {
        EnvFilter::try_from_default_env().or_else(|_| {
            EnvFilter::try_new(&self.default_directive).map_err(|err| TelemetryError::Filter {
                directive: self.default_directive.clone(),
                reason: err.to_string(),
            })
        })
    }
}

/// Installs the global formatted subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> TelemetryResult<()> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);
    let installed = if config.compact {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| TelemetryError::AlreadyInstalled {
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_is_reported() {
        let config = TelemetryConfig::default().with_default_directive("debug");
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::AlreadyInstalled { .. })
        ));
    }

    #[test]
    fn malformed_directive_is_rejected() {
        let config = TelemetryConfig::default().with_default_directive("pdp_index=loud");
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(config.filter(), Err(TelemetryError::Filter { .. })));
        }
    }
}
