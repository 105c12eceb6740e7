//! Configuration management for the embedded decision point.
//!
//! [`PdpConfiguration`] selects the combining algorithm, the retrieval
//! strategy and the variables bound in every evaluation. Providers load it
//! from a fixed value or from `pdp.json` on disk.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_FILE_NAME, ConfigurationProvider, FileConfigurationProvider,
    StaticConfigurationProvider,
};
pub use schema::PdpConfiguration;
