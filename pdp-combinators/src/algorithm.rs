//! The closed set of combining algorithms.

use std::fmt;
use std::str::FromStr;

use pdp_primitives::{AuthorizationDecision, Decision};
use serde::{Deserialize, Serialize};

use crate::{CombinatorError, ObligationAdviceCollector};

/// Strategy turning many per-document decisions into one.
///
/// Every algorithm receives the latest decision of each matched document in
/// document key order plus the retrieval's "errors in target" flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningAlgorithm {
    /// A deny wins; otherwise any uncertainty is indeterminate.
    #[default]
    DenyOverrides,
    /// A permit wins; otherwise any uncertainty is indeterminate.
    PermitOverrides,
    /// Permit only on an unambiguous permit, deny otherwise.
    DenyUnlessPermit,
    /// Deny on any deny, permit otherwise.
    PermitUnlessDeny,
    /// The first applicable document decides.
    FirstApplicable,
    /// Exactly one document may apply.
    OnlyOneApplicable,
}

impl CombiningAlgorithm {
    /// Every algorithm, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::DenyOverrides,
        Self::PermitOverrides,
        Self::DenyUnlessPermit,
        Self::PermitUnlessDeny,
        Self::FirstApplicable,
        Self::OnlyOneApplicable,
    ];

    /// Kebab-case name used in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DenyOverrides => "deny-overrides",
            Self::PermitOverrides => "permit-overrides",
            Self::DenyUnlessPermit => "deny-unless-permit",
            Self::PermitUnlessDeny => "permit-unless-deny",
            Self::FirstApplicable => "first-applicable",
            Self::OnlyOneApplicable => "only-one-applicable",
        }
    }

    /// Combines the decisions under this algorithm.
    #[must_use]
    pub fn combine(
        self,
        decisions: &[AuthorizationDecision],
        errors_in_target: bool,
    ) -> AuthorizationDecision {
        let tally = Tally::of(decisions);
        match self {
            Self::DenyOverrides => {
                if tally.deny > 0 {
                    finish(decisions, Decision::Deny)
                } else if tally.indeterminate > 0 || errors_in_target {
                    AuthorizationDecision::indeterminate()
                } else if tally.permit > 0 {
                    permit_or(decisions, &tally, AuthorizationDecision::indeterminate)
                } else {
                    AuthorizationDecision::not_applicable()
                }
            }
            Self::PermitOverrides => {
                if tally.permit > 0 {
                    permit_or(decisions, &tally, AuthorizationDecision::indeterminate)
                } else if tally.indeterminate > 0 || errors_in_target {
                    AuthorizationDecision::indeterminate()
                } else if tally.deny > 0 {
                    finish(decisions, Decision::Deny)
                } else {
                    AuthorizationDecision::not_applicable()
                }
            }
            Self::DenyUnlessPermit => {
                if tally.permit > 0 {
                    permit_or(decisions, &tally, AuthorizationDecision::deny)
                } else {
                    finish(decisions, Decision::Deny)
                }
            }
            Self::PermitUnlessDeny => {
                if tally.deny > 0 {
                    finish(decisions, Decision::Deny)
                } else {
                    permit_or(decisions, &tally, AuthorizationDecision::deny)
                }
            }
            Self::FirstApplicable => {
                if errors_in_target {
                    return AuthorizationDecision::indeterminate();
                }
                decisions
                    .iter()
                    .find(|decision| !decision.is_not_applicable())
                    .cloned()
                    .unwrap_or_else(AuthorizationDecision::not_applicable)
            }
            Self::OnlyOneApplicable => {
                if errors_in_target {
                    return AuthorizationDecision::indeterminate();
                }
                let mut applicable = decisions.iter().filter(|d| !d.is_not_applicable());
                match (applicable.next(), applicable.next()) {
                    (None, _) => AuthorizationDecision::not_applicable(),
                    (Some(only), None) => only.clone(),
                    (Some(_), Some(_)) => AuthorizationDecision::indeterminate(),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    permit: usize,
    deny: usize,
    indeterminate: usize,
    transformed: bool,
}

impl Tally {
    fn of(decisions: &[AuthorizationDecision]) -> Self {
        let mut tally = Self::default();
        for decision in decisions {
            match decision.decision() {
                Decision::Permit => {
                    tally.permit += 1;
                    tally.transformed |= decision.resource().is_some();
                }
                Decision::Deny => tally.deny += 1,
                Decision::Indeterminate => tally.indeterminate += 1,
                Decision::NotApplicable => {}
            }
        }
        tally
    }

    /// More than one permit while at least one transforms the resource:
    /// the resource to return is ambiguous.
    fn transformation_uncertain(&self) -> bool {
        self.permit > 1 && self.transformed
    }
}

fn finish(decisions: &[AuthorizationDecision], decision: Decision) -> AuthorizationDecision {
    ObligationAdviceCollector::collect(decisions).finish(decision)
}

/// Permit carrying the permits' constraints and the last permit's resource.
/// An ambiguous transformation yields the bare `on_uncertainty` decision.
fn permit_or(
    decisions: &[AuthorizationDecision],
    tally: &Tally,
    on_uncertainty: fn() -> AuthorizationDecision,
) -> AuthorizationDecision {
    if tally.transformation_uncertain() {
        return on_uncertainty();
    }
    let permit = finish(decisions, Decision::Permit);
    let resource = decisions
        .iter()
        .rev()
        .filter(|decision| decision.is_permit())
        .find_map(AuthorizationDecision::resource);
    match resource {
        Some(resource) => permit.with_resource(resource.clone()),
        None => permit,
    }
}

impl fmt::Display for CombiningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CombiningAlgorithm {
    type Err = CombinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| CombinatorError::UnknownAlgorithm { name: s.to_owned() })
    }
}
