//! Compiled policy documents.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use pdp_eval::{DecisionStream, EvaluationContext, PolicyBody};
use pdp_primitives::AuthorizationDecision;
use tracing::debug;

use crate::{DisjunctiveFormula, IndexResult, TargetExpr, TriState};

/// Policy document: a target guard compiled to normal form plus a body.
#[derive(Debug, Clone)]
pub struct PolicyDocument {
    name: String,
    target: TargetExpr,
    formula: DisjunctiveFormula,
    body: Arc<dyn PolicyBody>,
}

impl PolicyDocument {
    /// Compiles a document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::FormulaTooLarge`](crate::IndexError::FormulaTooLarge)
    /// when the target cannot be normalized within the clause limit.
    pub fn new(
        name: impl Into<String>,
        target: TargetExpr,
        body: impl PolicyBody + 'static,
    ) -> IndexResult<Self> {
        Self::from_shared_body(name, target, Arc::new(body))
    }

    /// Compiles a document around an already shared body.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyDocument::new`].
    pub fn from_shared_body(
        name: impl Into<String>,
        target: TargetExpr,
        body: Arc<dyn PolicyBody>,
    ) -> IndexResult<Self> {
        let name = name.into();
        let formula = DisjunctiveFormula::compile(&name, &target)?;
        Ok(Self {
            name,
            target,
            formula,
            body,
        })
    }

    /// Human-readable document name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target as authored.
    #[must_use]
    pub fn target(&self) -> &TargetExpr {
        &self.target
    }

    /// Target in normalized disjunctive form.
    #[must_use]
    pub fn formula(&self) -> &DisjunctiveFormula {
        &self.formula
    }

    /// Evaluates the authored target under `ctx`.
    #[must_use]
    pub fn match_target(&self, ctx: &EvaluationContext) -> TriState {
        self.target.evaluate(ctx)
    }

    /// Re-checks the target and evaluates the body.
    ///
    /// A false target contributes one not-applicable decision and a failing
    /// target one indeterminate decision; otherwise the body's stream is
    /// returned.
    #[must_use]
    pub fn evaluate(&self, ctx: Arc<EvaluationContext>) -> DecisionStream {
        match self.match_target(&ctx) {
            TriState::True => self.body.evaluate(ctx),
            TriState::False => stream::iter([AuthorizationDecision::not_applicable()]).boxed(),
            TriState::Failed(err) => {
                debug!(document = %self.name, error = %err, "target re-check failed");
                stream::iter([AuthorizationDecision::indeterminate()]).boxed()
            }
        }
    }
}
