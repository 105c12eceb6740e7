//! Embedded streaming policy decision point.
//!
//! [`EmbeddedPolicyDecisionPoint`] answers authorization subscriptions with
//! continuous decision streams. Each stream retrieves the applicable
//! documents from the configured index, combines their bodies with the
//! configured algorithm, and re-evaluates whenever documents, configuration
//! or the function registry change.

#![warn(missing_docs, clippy::pedantic)]

mod decision;
mod error;
mod pdp;

pub use error::{PdpError, PdpResult};
pub use pdp::{EmbeddedPolicyDecisionPoint, PdpBuilder};
