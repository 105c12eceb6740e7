//! Streaming policy decision point SDK facade.
//!
//! Depend on this crate to embed the decision point. It bundles the member
//! crates behind feature flags so downstream users can pull in only the
//! retrieval index, or the full engine with configuration and telemetry.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use pdp_primitives as primitives;

/// Expression and policy body contracts.
pub use pdp_eval as eval;

/// Document indexing and retrieval (enabled by `index` feature).
#[cfg(feature = "index")]
pub use pdp_index as index;

/// Combining algorithms (enabled by `combinators` feature).
#[cfg(feature = "combinators")]
pub use pdp_combinators as combinators;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use pdp_config as config;

/// Tracing setup and decision observers (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use pdp_telemetry as telemetry;

/// Embedded decision point (enabled by `engine` feature).
#[cfg(feature = "engine")]
pub use pdp_engine as engine;
