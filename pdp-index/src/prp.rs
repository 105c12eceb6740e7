//! Policy retrieval point: bulk loading and following document updates.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use pdp_eval::EvaluationContext;
use pdp_primitives::{AuthorizationSubscription, DocumentKey};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    BoundRetrieval, DocumentIndex, IndexMode, IndexResult, PolicyDocument, RetrievalResult,
};

/// Document source event.
#[derive(Debug, Clone)]
pub enum DocumentUpdate {
    /// A document was published or replaced.
    Publish {
        /// Key of the document.
        key: DocumentKey,
        /// Compiled document.
        document: Arc<PolicyDocument>,
    },
    /// A document was withdrawn.
    Withdraw {
        /// Key of the withdrawn document.
        key: DocumentKey,
    },
}

/// Front of an index fed by a document source.
#[derive(Debug, Clone)]
pub struct PolicyRetrievalPoint {
    index: Arc<dyn DocumentIndex>,
}

impl PolicyRetrievalPoint {
    /// Wraps an index.
    #[must_use]
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index }
    }

    /// Returns the wrapped index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn DocumentIndex> {
        &self.index
    }

    /// Retrieves the documents applicable under `ctx`.
    #[must_use]
    pub fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult {
        self.index.retrieve(ctx)
    }

    /// Binds and retrieves against one publication of the index; see
    /// [`DocumentIndex::retrieve_for`].
    #[must_use]
    pub fn retrieve_for(
        &self,
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
    ) -> BoundRetrieval {
        self.index.retrieve_for(subscription, variables)
    }

    /// Applies one update event.
    ///
    /// # Errors
    ///
    /// Propagates index publication failures.
    pub fn apply(&self, update: DocumentUpdate) -> IndexResult<()> {
        apply(self.index.as_ref(), update)
    }

    /// Loads an initial document set with a single rebuild.
    ///
    /// # Errors
    ///
    /// Propagates index publication failures; the index then stays static
    /// with the documents staged.
    pub fn load<I>(&self, documents: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = (DocumentKey, Arc<PolicyDocument>)>,
    {
        self.index.set_mode(IndexMode::Static)?;
        for (key, document) in documents {
            self.index.put(key, document)?;
        }
        self.index.set_mode(IndexMode::Live)?;
        info!(documents = self.index.len(), "initial document set loaded");
        Ok(())
    }

    /// Applies every event of `updates` on a background task.
    ///
    /// The task completes with `Ok` when the stream ends and stops at the
    /// first publication failure, returning it.
    pub fn follow<S>(&self, updates: S) -> JoinHandle<IndexResult<()>>
    where
        S: Stream<Item = DocumentUpdate> + Send + 'static,
    {
        let index = Arc::clone(&self.index);
        tokio::spawn(async move {
            let mut updates = Box::pin(updates);
            while let Some(update) = updates.next().await {
                if let Err(err) = apply(index.as_ref(), update) {
                    error!(error = %err, "document update rejected; no longer following");
                    return Err(err);
                }
            }
            info!("document update stream completed");
            Ok(())
        })
    }
}

fn apply(index: &dyn DocumentIndex, update: DocumentUpdate) -> IndexResult<()> {
    match update {
        DocumentUpdate::Publish { key, document } => {
            info!(document = %key, name = document.name(), "publishing document");
            index.put(key, document)
        }
        DocumentUpdate::Withdraw { key } => {
            if index.remove(&key)? {
                info!(document = %key, "document withdrawn");
            }
            Ok(())
        }
    }
}
