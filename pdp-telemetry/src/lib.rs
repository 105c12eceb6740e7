//! Observability utilities for the decision point.
//!
//! [`init_tracing`] installs a formatted `tracing` subscriber filtered by
//! `RUST_LOG` (or the configured default directive), and
//! [`DecisionObserver`] implementations are notified of every decision the
//! decision point emits.

#![warn(missing_docs, clippy::pedantic)]

mod observer;
mod subscriber;

pub use observer::{CompositeDecisionObserver, DecisionObserver, TracingDecisionObserver};
pub use subscriber::{TelemetryConfig, TelemetryError, TelemetryResult, init_tracing};
