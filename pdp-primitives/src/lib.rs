//! Core shared types for the streaming policy decision point.

#![warn(missing_docs, clippy::pedantic)]

mod decision;
mod error;
mod ids;
mod subscription;

/// Authorization decisions and the closed set of decision values.
pub use decision::{
    AuthorizationDecision, Decision, IdentifiableAuthorizationDecision, MultiAuthorizationDecision,
};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifiers for published documents and multi-subscription entries.
pub use ids::{DocumentKey, SubscriptionId};
/// Access requests submitted to the decision point.
pub use subscription::{AuthorizationSubscription, MultiAuthorizationSubscription};
