//! Outcome of a retrieval.

use std::sync::Arc;

use pdp_eval::{ContextError, EvaluationContext};
use pdp_primitives::DocumentKey;

use crate::PolicyDocument;

/// Documents whose target matched a request, in document key order, and
/// whether any candidate's target failed to evaluate.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    matches: Vec<(DocumentKey, Arc<PolicyDocument>)>,
    errors_in_target: bool,
}

impl RetrievalResult {
    /// Empty result without errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty result with the error flag set.
    #[must_use]
    pub fn errored() -> Self {
        Self {
            matches: Vec::new(),
            errors_in_target: true,
        }
    }

    pub(crate) fn push(&mut self, key: DocumentKey, document: Arc<PolicyDocument>) {
        self.matches.push((key, document));
    }

    pub(crate) fn mark_error(&mut self) {
        self.errors_in_target = true;
    }

    /// Matched documents with their keys.
    #[must_use]
    pub fn matches(&self) -> &[(DocumentKey, Arc<PolicyDocument>)] {
        &self.matches
    }

    /// Matched document keys.
    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.matches.iter().map(|(key, _)| key)
    }

    /// Matched documents.
    pub fn documents(&self) -> impl Iterator<Item = &Arc<PolicyDocument>> {
        self.matches.iter().map(|(_, document)| document)
    }

    /// Number of matched documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns `true` when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Returns `true` when a candidate's target evaluation failed.
    #[must_use]
    pub fn errors_in_target(&self) -> bool {
        self.errors_in_target
    }
}

/// Retrieval bound to the evaluation context it was computed under.
///
/// The context carries the function registry published together with the
/// retrieved snapshot, so evaluating the matched bodies under it keeps the
/// whole decision on one registry.
#[derive(Debug, Clone)]
pub struct BoundRetrieval {
    context: Result<Arc<EvaluationContext>, ContextError>,
    result: RetrievalResult,
}

impl BoundRetrieval {
    pub(crate) fn new(
        context: Result<Arc<EvaluationContext>, ContextError>,
        result: RetrievalResult,
    ) -> Self {
        Self { context, result }
    }

    /// Context the retrieval ran under, or why the subscription could not
    /// be bound. A failed binding comes with an errored empty result.
    ///
    /// # Errors
    ///
    /// Returns the [`ContextError`] raised while binding the subscription.
    pub fn context(&self) -> Result<&Arc<EvaluationContext>, &ContextError> {
        self.context.as_ref()
    }

    /// The retrieval itself.
    #[must_use]
    pub fn result(&self) -> &RetrievalResult {
        &self.result
    }

    /// Splits into the context and the retrieval.
    #[must_use]
    pub fn into_parts(self) -> (Result<Arc<EvaluationContext>, ContextError>, RetrievalResult) {
        (self.context, self.result)
    }
}
