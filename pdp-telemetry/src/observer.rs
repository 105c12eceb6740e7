//! Observers notified of every emitted decision.

use std::fmt;
use std::sync::Arc;

use pdp_primitives::{AuthorizationDecision, AuthorizationSubscription, Decision};
use tracing::{debug, warn};

/// Observer hook invoked whenever the decision point emits a decision.
pub trait DecisionObserver: Send + Sync {
    /// Records the decision emitted for the supplied subscription.
    fn on_decision(
        &self,
        subscription: &AuthorizationSubscription,
        decision: &AuthorizationDecision,
    );
}

/// Observer that emits decisions to the tracing system.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDecisionObserver;

impl DecisionObserver for TracingDecisionObserver {
    fn on_decision(
        &self,
        subscription: &AuthorizationSubscription,
        decision: &AuthorizationDecision,
    ) {
        let subject = subscription.subject();
        let action = subscription.action();
        let obligations = decision.obligations().len();
        match decision.decision() {
            Decision::Permit => {
                debug!(%subject, %action, obligations, "decision permit");
            }
            Decision::NotApplicable => {
                debug!(%subject, %action, "decision not applicable");
            }
            Decision::Deny => {
                warn!(%subject, %action, obligations, "decision deny");
            }
            Decision::Indeterminate => {
                warn!(%subject, %action, "decision indeterminate");
            }
        }
    }
}

/// Composite observer that forwards decisions to a collection of observers.
#[derive(Default, Clone)]
pub struct CompositeDecisionObserver {
    observers: Vec<Arc<dyn DecisionObserver>>,
}

impl CompositeDecisionObserver {
    /// Creates a new composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn DecisionObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer to the composite set.
    pub fn push(&mut self, observer: Arc<dyn DecisionObserver>) {
        self.observers.push(observer);
    }
}

impl fmt::Debug for CompositeDecisionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDecisionObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DecisionObserver for CompositeDecisionObserver {
    fn on_decision(
        &self,
        subscription: &AuthorizationSubscription,
        decision: &AuthorizationDecision,
    ) {
        for observer in &self.observers {
            observer.on_decision(subscription, decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Decision>>);

    impl DecisionObserver for Recorder {
        fn on_decision(&self, _: &AuthorizationSubscription, decision: &AuthorizationDecision) {
            self.0.lock().unwrap().push(decision.decision());
        }
    }

    #[test]
    fn composite_forwards_to_every_observer() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let mut composite = CompositeDecisionObserver::new([
            Arc::clone(&first) as Arc<dyn DecisionObserver>,
            Arc::new(TracingDecisionObserver),
        ]);
        composite.push(Arc::clone(&second) as Arc<dyn DecisionObserver>);

        let subscription =
            AuthorizationSubscription::new(json!("willi"), json!("read"), json!(null));
        composite.on_decision(&subscription, &AuthorizationDecision::deny());
        composite.on_decision(&subscription, &AuthorizationDecision::permit());

        assert_eq!(*first.0.lock().unwrap(), [Decision::Deny, Decision::Permit]);
        assert_eq!(*second.0.lock().unwrap(), [Decision::Deny, Decision::Permit]);
    }
}
