//! The retrieval index contract shared by both strategies.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pdp_eval::{EvaluationContext, FunctionContext};
use pdp_primitives::{AuthorizationSubscription, DocumentKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::{
    BoundRetrieval, ImprovedIndex, IndexResult, PolicyDocument, RetrievalResult, SimpleIndex,
};

/// Publication mode of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Every mutation is published immediately.
    #[default]
    Live,
    /// The published document set is frozen; mutations are staged until the
    /// index switches back to live.
    Static,
}

/// Retrieval strategy selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Evaluates every document's target independently.
    Simple,
    /// Shares predicate evaluations through conjunction bit-vectors.
    #[default]
    Improved,
}

impl IndexType {
    /// Creates an empty index of this type.
    #[must_use]
    pub fn build(self, functions: Arc<FunctionContext>) -> Arc<dyn DocumentIndex> {
        match self {
            Self::Simple => Arc::new(SimpleIndex::with_functions(functions)),
            Self::Improved => Arc::new(ImprovedIndex::with_functions(functions)),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Improved => "improved",
        })
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "improved" => Ok(Self::Improved),
            other => Err(format!("unknown index type `{other}`")),
        }
    }
}

/// Index answering "which documents apply to this request".
///
/// Mutations are serialized among themselves; retrievals observe either the
/// previous or the next published document set, never a mix. Every
/// publication pairs a snapshot with the function registry it was built
/// under. Both strategies return identical matches and error flags for
/// every request.
pub trait DocumentIndex: Send + Sync + fmt::Debug {
    /// Returns the published documents whose target holds under `ctx`.
    ///
    /// `ctx` must carry the published registry; prefer
    /// [`retrieve_for`](Self::retrieve_for), which guarantees it.
    fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult;

    /// Binds the subscription under the published registry and retrieves
    /// from the snapshot published with that registry. A binding failure
    /// yields an empty result with the error flag set.
    fn retrieve_for(
        &self,
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
    ) -> BoundRetrieval;

    /// Function registry of the current publication.
    fn function_context(&self) -> Arc<FunctionContext>;

    /// Publishes or replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupted`](crate::IndexError::Corrupted) when the
    /// rebuilt snapshot is invalid; the previous snapshot stays published.
    fn put(&self, key: DocumentKey, document: Arc<PolicyDocument>) -> IndexResult<()>;

    /// Withdraws a document, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentIndex::put`].
    fn remove(&self, key: &DocumentKey) -> IndexResult<bool>;

    /// Replaces the function registry and publishes it; open retrievals
    /// switch to it together with the matching snapshot.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentIndex::put`].
    fn update_function_context(&self, functions: Arc<FunctionContext>) -> IndexResult<()>;

    /// Switches between live and static publication. Switching to live
    /// publishes every staged mutation with one rebuild.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentIndex::put`]; the index then stays static.
    fn set_mode(&self, mode: IndexMode) -> IndexResult<()>;

    /// Current publication mode.
    fn mode(&self) -> IndexMode;

    /// Number of published documents.
    fn len(&self) -> usize;

    /// Returns `true` when no document is published.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watches the publication generation, which ticks on every publication,
    /// registry replacements included.
    fn subscribe(&self) -> watch::Receiver<u64>;
}
