//! Naive strategy: every document's authored target is evaluated on its own.

use std::sync::Arc;

use pdp_eval::{EvaluationContext, FunctionContext};
use pdp_primitives::{AuthorizationSubscription, DocumentKey};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;

use crate::store::{Documents, IndexCore, Snapshot};
use crate::{
    BoundRetrieval, DocumentIndex, IndexMode, IndexResult, PolicyDocument, RetrievalResult,
    TriState,
};

#[derive(Debug, Default)]
pub(crate) struct SimpleSnapshot {
    documents: Vec<(DocumentKey, Arc<PolicyDocument>)>,
}

impl Snapshot for SimpleSnapshot {
    const FOLDS_FUNCTIONS: bool = false;

    fn empty() -> Self {
        Self::default()
    }

    fn build(documents: &Documents, _functions: &Arc<FunctionContext>) -> IndexResult<Self> {
        Ok(Self {
            documents: documents
                .iter()
                .map(|(key, document)| (key.clone(), Arc::clone(document)))
                .collect(),
        })
    }

    fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult {
        let mut result = RetrievalResult::new();
        for (key, document) in &self.documents {
            match document.match_target(ctx) {
                TriState::True => result.push(key.clone(), Arc::clone(document)),
                TriState::False => {}
                TriState::Failed(err) => {
                    debug!(document = %key, error = %err, "target evaluation failed");
                    result.mark_error();
                }
            }
        }
        result
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Index evaluating the full target of every published document.
#[derive(Debug)]
pub struct SimpleIndex {
    core: IndexCore<SimpleSnapshot>,
}

impl SimpleIndex {
    /// Creates an empty index with an empty function registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_functions(Arc::new(FunctionContext::new()))
    }

    /// Creates an empty index bound to `functions`.
    #[must_use]
    pub fn with_functions(functions: Arc<FunctionContext>) -> Self {
        Self {
            core: IndexCore::new(functions),
        }
    }
}

impl Default for SimpleIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentIndex for SimpleIndex {
    fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult {
        self.core.retrieve(ctx)
    }

    fn retrieve_for(
        &self,
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
    ) -> BoundRetrieval {
        self.core.retrieve_for(subscription, variables)
    }

    fn function_context(&self) -> Arc<FunctionContext> {
        self.core.functions()
    }

    fn put(&self, key: DocumentKey, document: Arc<PolicyDocument>) -> IndexResult<()> {
        self.core.mutate(|documents| {
            documents.insert(key, document);
        })
    }

    fn remove(&self, key: &DocumentKey) -> IndexResult<bool> {
        self.core.mutate(|documents| documents.remove(key).is_some())
    }

    fn update_function_context(&self, functions: Arc<FunctionContext>) -> IndexResult<()> {
        self.core.update_functions(functions)
    }

    fn set_mode(&self, mode: IndexMode) -> IndexResult<()> {
        self.core.set_mode(mode)
    }

    fn mode(&self) -> IndexMode {
        self.core.mode()
    }

    fn len(&self) -> usize {
        self.core.len()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.subscribe()
    }
}
