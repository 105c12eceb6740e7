//! Authorization decision types emitted by the decision point.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SubscriptionId;

/// Closed set of decision values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Access is granted.
    Permit,
    /// Access is rejected.
    Deny,
    /// No policy applied to the request.
    NotApplicable,
    /// Evaluation could not reach a definite result.
    Indeterminate,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Permit => "PERMIT",
            Self::Deny => "DENY",
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::Indeterminate => "INDETERMINATE",
        })
    }
}

/// Structured decision: the decision value plus the constraints attached by
/// the policies that produced it.
///
/// Obligations and advice are opaque JSON to the decision point; the policy
/// enforcement point interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    obligations: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    advice: Vec<Value>,
}

impl AuthorizationDecision {
    /// Creates a bare decision without constraints.
    #[must_use]
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            resource: None,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    /// Returns a bare permit.
    #[must_use]
    pub fn permit() -> Self {
        Self::new(Decision::Permit)
    }

    /// Returns a bare deny.
    #[must_use]
    pub fn deny() -> Self {
        Self::new(Decision::Deny)
    }

    /// Returns a not-applicable decision.
    #[must_use]
    pub fn not_applicable() -> Self {
        Self::new(Decision::NotApplicable)
    }

    /// Returns an indeterminate decision.
    #[must_use]
    pub fn indeterminate() -> Self {
        Self::new(Decision::Indeterminate)
    }

    /// Attaches a transformed resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Appends an obligation.
    #[must_use]
    pub fn with_obligation(mut self, obligation: Value) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// Appends an advice entry.
    #[must_use]
    pub fn with_advice(mut self, advice: Value) -> Self {
        self.advice.push(advice);
        self
    }

    /// Replaces the obligation list.
    #[must_use]
    pub fn with_obligations(mut self, obligations: Vec<Value>) -> Self {
        self.obligations = obligations;
        self
    }

    /// Replaces the advice list.
    #[must_use]
    pub fn with_advice_list(mut self, advice: Vec<Value>) -> Self {
        self.advice = advice;
        self
    }

    /// Returns the decision value.
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Returns the transformed resource, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_ref()
    }

    /// Returns the obligations.
    #[must_use]
    pub fn obligations(&self) -> &[Value] {
        &self.obligations
    }

    /// Returns the advice entries.
    #[must_use]
    pub fn advice(&self) -> &[Value] {
        &self.advice
    }

    /// Returns true for permit decisions.
    #[must_use]
    pub fn is_permit(&self) -> bool {
        self.decision == Decision::Permit
    }

    /// Returns true for deny decisions.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.decision == Decision::Deny
    }

    /// Returns true for not-applicable decisions.
    #[must_use]
    pub fn is_not_applicable(&self) -> bool {
        self.decision == Decision::NotApplicable
    }

    /// Returns true for indeterminate decisions.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.decision == Decision::Indeterminate
    }
}

impl From<Decision> for AuthorizationDecision {
    fn from(value: Decision) -> Self {
        Self::new(value)
    }
}

/// Decision tagged with the id of the subscription it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiableAuthorizationDecision {
    subscription_id: SubscriptionId,
    decision: AuthorizationDecision,
}

impl IdentifiableAuthorizationDecision {
    /// Tags a decision with its subscription id.
    #[must_use]
    pub fn new(subscription_id: SubscriptionId, decision: AuthorizationDecision) -> Self {
        Self {
            subscription_id,
            decision,
        }
    }

    /// Returns the subscription id.
    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Returns the decision.
    #[must_use]
    pub fn decision(&self) -> &AuthorizationDecision {
        &self.decision
    }
}

/// Decisions for every subscription of a multi-subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiAuthorizationDecision {
    #[serde(default)]
    decisions: BTreeMap<SubscriptionId, AuthorizationDecision>,
}

impl MultiAuthorizationDecision {
    /// Creates an empty multi-decision.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the decision for a subscription.
    pub fn insert(&mut self, subscription_id: SubscriptionId, decision: AuthorizationDecision) {
        self.decisions.insert(subscription_id, decision);
    }

    /// Returns the decision for a subscription.
    #[must_use]
    pub fn get(&self, subscription_id: SubscriptionId) -> Option<&AuthorizationDecision> {
        self.decisions.get(&subscription_id)
    }

    /// Returns the number of decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Returns `true` when no decision is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

impl FromIterator<IdentifiableAuthorizationDecision> for MultiAuthorizationDecision {
    fn from_iter<I: IntoIterator<Item = IdentifiableAuthorizationDecision>>(iter: I) -> Self {
        let mut multi = Self::new();
        for entry in iter {
            multi.insert(entry.subscription_id, entry.decision);
        }
        multi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_helpers_work() {
        let permit = AuthorizationDecision::permit()
            .with_obligation(json!("log"))
            .with_advice(json!("notify"));
        assert!(permit.is_permit());
        assert!(!permit.is_deny());
        assert_eq!(permit.obligations(), [json!("log")]);
        assert_eq!(permit.advice(), [json!("notify")]);

        assert!(AuthorizationDecision::indeterminate().is_indeterminate());
        assert!(AuthorizationDecision::not_applicable().is_not_applicable());
    }

    #[test]
    fn serializes_with_wire_names() {
        let value = serde_json::to_value(AuthorizationDecision::not_applicable()).unwrap();
        assert_eq!(value, json!({"decision": "NOT_APPLICABLE"}));

        let parsed: AuthorizationDecision =
            serde_json::from_value(json!({"decision": "PERMIT", "resource": 1})).unwrap();
        assert_eq!(parsed, AuthorizationDecision::permit().with_resource(json!(1)));
    }

    #[test]
    fn multi_decision_collects_identifiable_entries() {
        let a = SubscriptionId::random();
        let b = SubscriptionId::random();
        let multi: MultiAuthorizationDecision = [
            IdentifiableAuthorizationDecision::new(a, AuthorizationDecision::permit()),
            IdentifiableAuthorizationDecision::new(b, AuthorizationDecision::deny()),
        ]
        .into_iter()
        .collect();

        assert_eq!(multi.len(), 2);
        assert!(multi.get(a).is_some_and(AuthorizationDecision::is_permit));
        assert!(multi.get(b).is_some_and(AuthorizationDecision::is_deny));
    }
}
