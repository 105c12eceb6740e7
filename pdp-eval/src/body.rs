//! Policy body contract and simple body implementations.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use pdp_primitives::{AuthorizationDecision, Decision};
use serde_json::Value;
use tracing::debug;

use crate::{Bool, EvaluationContext};

/// Continuous stream of decisions produced by a policy body.
///
/// Streams may be finite or infinite. Failures are values
/// ([`Decision::Indeterminate`]), never stream faults. Dropping the stream
/// cancels it and must release every underlying attribute subscription.
pub type DecisionStream = Pin<Box<dyn Stream<Item = AuthorizationDecision> + Send>>;

/// Evaluable body of a policy document.
pub trait PolicyBody: fmt::Debug + Send + Sync {
    /// Starts evaluating the body under the supplied context.
    fn evaluate(&self, ctx: Arc<EvaluationContext>) -> DecisionStream;
}

/// Body that always yields one fixed decision.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticBody(AuthorizationDecision);

impl StaticBody {
    /// Creates the body.
    #[must_use]
    pub fn new(decision: AuthorizationDecision) -> Self {
        Self(decision)
    }
}

impl PolicyBody for StaticBody {
    fn evaluate(&self, _ctx: Arc<EvaluationContext>) -> DecisionStream {
        stream::iter([self.0.clone()]).boxed()
    }
}

/// Body with an entitlement guarded by an optional condition.
///
/// A true (or absent) condition yields the entitlement with the configured
/// obligations, advice and resource; a false condition yields
/// not-applicable; a failing condition yields indeterminate.
#[derive(Debug, Clone)]
pub struct ConditionalBody {
    entitlement: Decision,
    condition: Option<Arc<dyn Bool>>,
    obligations: Vec<Value>,
    advice: Vec<Value>,
    resource: Option<Value>,
}

impl ConditionalBody {
    /// Body granting access.
    #[must_use]
    pub fn permit() -> Self {
        Self::with_entitlement(Decision::Permit)
    }

    /// Body rejecting access.
    #[must_use]
    pub fn deny() -> Self {
        Self::with_entitlement(Decision::Deny)
    }

    fn with_entitlement(entitlement: Decision) -> Self {
        Self {
            entitlement,
            condition: None,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: None,
        }
    }

    /// Guards the entitlement with a condition.
    #[must_use]
    pub fn when(mut self, condition: Arc<dyn Bool>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attaches an obligation to the entitlement.
    #[must_use]
    pub fn obligation(mut self, obligation: Value) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// Attaches advice to the entitlement.
    #[must_use]
    pub fn advice(mut self, advice: Value) -> Self {
        self.advice.push(advice);
        self
    }

    /// Attaches a transformed resource to the entitlement.
    #[must_use]
    pub fn transform(mut self, resource: Value) -> Self {
        self.resource = Some(resource);
        self
    }

    fn decide(&self, ctx: &EvaluationContext) -> AuthorizationDecision {
        let applicable = match &self.condition {
            None => Ok(true),
            Some(condition) => condition.evaluate(ctx),
        };

        match applicable {
            Ok(true) => {
                let decision = AuthorizationDecision::new(self.entitlement)
                    .with_obligations(self.obligations.clone())
                    .with_advice_list(self.advice.clone());
                match &self.resource {
                    Some(resource) => decision.with_resource(resource.clone()),
                    None => decision,
                }
            }
            Ok(false) => AuthorizationDecision::not_applicable(),
            Err(err) => {
                debug!(error = %err, "policy condition failed");
                AuthorizationDecision::indeterminate()
            }
        }
    }
}

impl PolicyBody for ConditionalBody {
    fn evaluate(&self, ctx: Arc<EvaluationContext>) -> DecisionStream {
        stream::iter([self.decide(&ctx)]).boxed()
    }
}
