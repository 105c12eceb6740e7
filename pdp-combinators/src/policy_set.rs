//! Policy sets: a body combining nested, individually targeted policies.

use std::fmt;
use std::sync::Arc;

use pdp_eval::{DecisionStream, EvaluationContext, PolicyBody};
use pdp_index::{TargetExpr, TriState};
use tracing::debug;

use crate::CombiningAlgorithm;
use crate::combinator::combine_streams;

struct NestedPolicy {
    name: String,
    target: TargetExpr,
    body: Arc<dyn PolicyBody>,
}

/// Body made of nested policies combined with their own algorithm.
///
/// On evaluation every nested target is matched under the request. Matching
/// policies contribute their body's stream; a failing target sets the set's
/// "errors in target" flag, exactly like a failing document target does at
/// the top level. Without any matching policy the set emits one decision
/// (the algorithm applied to no decisions) and completes.
#[derive(Default)]
pub struct PolicySet {
    algorithm: CombiningAlgorithm,
    policies: Vec<NestedPolicy>,
}

impl PolicySet {
    /// Creates an empty set combining with `algorithm`.
    #[must_use]
    pub fn new(algorithm: CombiningAlgorithm) -> Self {
        Self {
            algorithm,
            policies: Vec::new(),
        }
    }

    /// Appends a nested policy. Policies are combined in insertion order.
    #[must_use]
    pub fn policy(
        mut self,
        name: impl Into<String>,
        target: TargetExpr,
        body: impl PolicyBody + 'static,
    ) -> Self {
        self.policies.push(NestedPolicy {
            name: name.into(),
            target,
            body: Arc::new(body),
        });
        self
    }

    /// Algorithm combining the nested policies.
    #[must_use]
    pub fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    /// Number of nested policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` when the set has no nested policy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl PolicyBody for PolicySet {
    fn evaluate(&self, ctx: Arc<EvaluationContext>) -> DecisionStream {
        let mut errors_in_target = false;
        let mut contributors = Vec::new();
        for policy in &self.policies {
            match policy.target.evaluate(&ctx) {
                TriState::True => contributors.push(policy.body.evaluate(Arc::clone(&ctx))),
                TriState::False => {}
                TriState::Failed(err) => {
                    debug!(policy = %policy.name, error = %err, "nested target failed");
                    errors_in_target = true;
                }
            }
        }
        combine_streams(self.algorithm, contributors, errors_in_target)
    }
}

impl fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.policies.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("PolicySet")
            .field("algorithm", &self.algorithm)
            .field("policies", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pdp_eval::{AttributeEquals, FunctionContext, StaticBody};
    use pdp_primitives::{AuthorizationDecision, AuthorizationSubscription, Decision};
    use serde_json::{Map, Value, json};

    fn ctx(resource: Value) -> Arc<EvaluationContext> {
        let subscription = AuthorizationSubscription::new(json!("willi"), json!("read"), resource);
        Arc::new(
            EvaluationContext::new(&subscription, &Map::new(), Arc::new(FunctionContext::new()))
                .unwrap(),
        )
    }

    fn owned_by(owner: &str) -> TargetExpr {
        TargetExpr::test(AttributeEquals::new(
            "resource.owner".parse().unwrap(),
            json!(owner),
        ))
    }

    async fn decisions(set: &PolicySet, resource: Value) -> Vec<Decision> {
        set.evaluate(ctx(resource))
            .map(|decision| decision.decision())
            .collect()
            .await
    }

    #[tokio::test]
    async fn nested_policies_are_matched_and_combined() {
        let set = PolicySet::new(CombiningAlgorithm::DenyOverrides)
            .policy("owner", owned_by("willi"), StaticBody::new(AuthorizationDecision::permit()))
            .policy("others", !owned_by("willi"), StaticBody::new(AuthorizationDecision::deny()));

        assert_eq!(set.len(), 2);
        assert_eq!(decisions(&set, json!({"owner": "willi"})).await, [Decision::Permit]);
        assert_eq!(decisions(&set, json!({"owner": "bob"})).await, [Decision::Deny]);
    }

    #[tokio::test]
    async fn nested_target_errors_reach_the_set_algorithm() {
        let set = PolicySet::new(CombiningAlgorithm::DenyOverrides)
            .policy(
                "anyone",
                TargetExpr::always(),
                StaticBody::new(AuthorizationDecision::permit()),
            )
            .policy("owner", owned_by("willi"), StaticBody::new(AuthorizationDecision::deny()));

        // the owner cannot be resolved, so the permit is not trusted
        assert_eq!(decisions(&set, json!({})).await, [Decision::Indeterminate]);

        let lenient = PolicySet::new(CombiningAlgorithm::PermitUnlessDeny)
            .policy("owner", owned_by("willi"), StaticBody::new(AuthorizationDecision::deny()));
        assert_eq!(decisions(&lenient, json!({})).await, [Decision::Permit]);
    }

    #[tokio::test]
    async fn sets_without_matches_emit_once() {
        let empty = PolicySet::new(CombiningAlgorithm::DenyUnlessPermit);
        assert!(empty.is_empty());
        assert_eq!(decisions(&empty, json!({})).await, [Decision::Deny]);

        let unmatched = PolicySet::new(CombiningAlgorithm::FirstApplicable)
            .policy("owner", owned_by("bob"), StaticBody::new(AuthorizationDecision::permit()));
        assert_eq!(
            decisions(&unmatched, json!({"owner": "willi"})).await,
            [Decision::NotApplicable]
        );
    }
}
