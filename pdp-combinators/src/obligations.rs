//! Collection of obligations and advice from agreeing decisions.

use pdp_primitives::{AuthorizationDecision, Decision};
use serde_json::Value;

#[derive(Debug, Default)]
struct Constraints {
    obligations: Vec<Value>,
    advice: Vec<Value>,
}

/// Gathers the obligations and advice of permits and denies separately, in
/// contributor order, so the combined decision can carry those of the
/// decisions that agree with it.
#[derive(Debug, Default)]
pub struct ObligationAdviceCollector {
    permit: Constraints,
    deny: Constraints,
}

impl ObligationAdviceCollector {
    /// Collects from every decision.
    #[must_use]
    pub fn collect(decisions: &[AuthorizationDecision]) -> Self {
        let mut collector = Self::default();
        for decision in decisions {
            collector.add(decision);
        }
        collector
    }

    /// Records the constraints of one decision.
    pub fn add(&mut self, decision: &AuthorizationDecision) {
        let bucket = match decision.decision() {
            Decision::Permit => &mut self.permit,
            Decision::Deny => &mut self.deny,
            Decision::NotApplicable | Decision::Indeterminate => return,
        };
        bucket.obligations.extend_from_slice(decision.obligations());
        bucket.advice.extend_from_slice(decision.advice());
    }

    /// Builds the final decision with the constraints that agree with it.
    /// Indeterminate and not-applicable decisions carry none.
    #[must_use]
    pub fn finish(self, decision: Decision) -> AuthorizationDecision {
        let constraints = match decision {
            Decision::Permit => self.permit,
            Decision::Deny => self.deny,
            Decision::NotApplicable | Decision::Indeterminate => Constraints::default(),
        };
        AuthorizationDecision::new(decision)
            .with_obligations(constraints.obligations)
            .with_advice_list(constraints.advice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_agreeing_constraints_are_kept() {
        let decisions = [
            AuthorizationDecision::permit().with_obligation(json!("p1")),
            AuthorizationDecision::deny()
                .with_obligation(json!("d1"))
                .with_advice(json!("da")),
            AuthorizationDecision::permit().with_advice(json!("pa")),
            AuthorizationDecision::deny().with_obligation(json!("d2")),
        ];

        let deny = ObligationAdviceCollector::collect(&decisions).finish(Decision::Deny);
        assert_eq!(deny.obligations(), [json!("d1"), json!("d2")]);
        assert_eq!(deny.advice(), [json!("da")]);

        let permit = ObligationAdviceCollector::collect(&decisions).finish(Decision::Permit);
        assert_eq!(permit.obligations(), [json!("p1")]);
        assert_eq!(permit.advice(), [json!("pa")]);

        let undecided =
            ObligationAdviceCollector::collect(&decisions).finish(Decision::Indeterminate);
        assert!(undecided.obligations().is_empty());
    }
}
