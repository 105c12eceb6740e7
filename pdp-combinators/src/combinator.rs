//! Combination of the decision streams of matched documents.

use std::sync::Arc;

use futures::{StreamExt, stream};
use pdp_eval::{DecisionStream, EvaluationContext};
use pdp_index::RetrievalResult;
use tracing::{debug, trace};

use crate::{CombineLatest, CombiningAlgorithm};

/// Turns a retrieval result into one continuously updated decision stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentCombinator {
    algorithm: CombiningAlgorithm,
}

impl DocumentCombinator {
    /// Creates a combinator for `algorithm`.
    #[must_use]
    pub const fn new(algorithm: CombiningAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Returns the combining algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    /// Evaluates every matched document under `ctx` and combines the
    /// latest decision of each on every change.
    ///
    /// Without matches, exactly one decision (the algorithm applied to no
    /// decisions and the error flag) is emitted before the stream completes.
    /// Dropping the returned stream drops every document stream.
    #[must_use]
    pub fn combine(
        &self,
        retrieval: &RetrievalResult,
        ctx: Arc<EvaluationContext>,
    ) -> DecisionStream {
        let contributors = retrieval
            .documents()
            .map(|document| document.evaluate(Arc::clone(&ctx)))
            .collect();
        combine_streams(self.algorithm, contributors, retrieval.errors_in_target())
    }
}

/// Combines the latest decision of every contributor under `algorithm`.
/// Without contributors, one decision is emitted and the stream completes.
pub(crate) fn combine_streams(
    algorithm: CombiningAlgorithm,
    contributors: Vec<DecisionStream>,
    errors_in_target: bool,
) -> DecisionStream {
    if contributors.is_empty() {
        let decision = algorithm.combine(&[], errors_in_target);
        debug!(
            %algorithm,
            errors_in_target,
            decision = %decision.decision(),
            "nothing applicable"
        );
        return stream::iter([decision]).boxed();
    }

    debug!(
        %algorithm,
        contributors = contributors.len(),
        errors_in_target,
        "combining decisions"
    );
    CombineLatest::new(contributors)
        .map(move |decisions| {
            let combined = algorithm.combine(&decisions, errors_in_target);
            trace!(%algorithm, decision = %combined.decision(), "recombined");
            combined
        })
        .boxed()
}

impl From<CombiningAlgorithm> for DocumentCombinator {
    fn from(algorithm: CombiningAlgorithm) -> Self {
        Self::new(algorithm)
    }
}
