//! Copy-on-write publication shared by both index strategies.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use pdp_eval::{EvaluationContext, FunctionContext};
use pdp_primitives::{AuthorizationSubscription, DocumentKey};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{BoundRetrieval, IndexMode, IndexResult, PolicyDocument, RetrievalResult};

pub(crate) type Documents = BTreeMap<DocumentKey, Arc<PolicyDocument>>;

/// Immutable, fully built view of one published document set.
pub(crate) trait Snapshot: Send + Sync + Sized {
    /// Whether the build depends on the function registry.
    const FOLDS_FUNCTIONS: bool;

    fn empty() -> Self;

    fn build(documents: &Documents, functions: &Arc<FunctionContext>) -> IndexResult<Self>;

    fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult;

    fn len(&self) -> usize;
}

#[derive(Debug)]
struct Staging {
    documents: Documents,
    published_documents: Documents,
    functions: Arc<FunctionContext>,
    mode: IndexMode,
}

/// A snapshot paired with the registry it was published under. Readers
/// always take both from the same publication.
#[derive(Debug)]
struct Published<S> {
    snapshot: Arc<S>,
    functions: Arc<FunctionContext>,
}

/// Writer-serialized staging area plus the atomically swapped publication.
#[derive(Debug)]
pub(crate) struct IndexCore<S> {
    published: RwLock<Arc<Published<S>>>,
    staging: Mutex<Staging>,
    generation: watch::Sender<u64>,
}

impl<S: Snapshot> IndexCore<S> {
    pub(crate) fn new(functions: Arc<FunctionContext>) -> Self {
        Self {
            published: RwLock::new(Arc::new(Published {
                snapshot: Arc::new(S::empty()),
                functions: Arc::clone(&functions),
            })),
            staging: Mutex::new(Staging {
                documents: Documents::new(),
                published_documents: Documents::new(),
                functions,
                mode: IndexMode::Live,
            }),
            generation: watch::channel(0).0,
        }
    }

    /// # Panics
    ///
    /// Panics if the snapshot lock is poisoned.
    fn published(&self) -> Arc<Published<S>> {
        Arc::clone(&self.published.read().expect("index snapshot lock poisoned"))
    }

    pub(crate) fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.published().snapshot)
    }

    pub(crate) fn functions(&self) -> Arc<FunctionContext> {
        Arc::clone(&self.published().functions)
    }

    pub(crate) fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult {
        self.snapshot().retrieve(ctx)
    }

    /// Binds the subscription under the published registry and retrieves
    /// from the snapshot published with it.
    pub(crate) fn retrieve_for(
        &self,
        subscription: &AuthorizationSubscription,
        variables: &Map<String, Value>,
    ) -> BoundRetrieval {
        let published = self.published();
        match EvaluationContext::new(subscription, variables, Arc::clone(&published.functions)) {
            Ok(ctx) => {
                let result = published.snapshot.retrieve(&ctx);
                BoundRetrieval::new(Ok(Arc::new(ctx)), result)
            }
            Err(err) => {
                warn!(error = %err, "evaluation context rejected");
                BoundRetrieval::new(Err(err), RetrievalResult::errored())
            }
        }
    }

    /// Applies `mutate` to a copy of the staged documents and, in live mode,
    /// publishes the result. Nothing is committed when the build fails.
    ///
    /// # Panics
    ///
    /// Panics if the staging lock is poisoned.
    pub(crate) fn mutate<T>(&self, mutate: impl FnOnce(&mut Documents) -> T) -> IndexResult<T> {
        let mut staging = self.staging.lock().expect("index staging lock poisoned");
        let mut documents = staging.documents.clone();
        let outcome = mutate(&mut documents);
        if staging.mode == IndexMode::Live {
            self.publish(&documents, &staging.functions)?;
            staging.published_documents.clone_from(&documents);
        }
        staging.documents = documents;
        Ok(outcome)
    }

    /// Swaps the function registry and publishes it, in static mode too.
    /// Folding snapshots rebuild the published document set; others keep
    /// their snapshot and only pair it with the new registry.
    ///
    /// # Panics
    ///
    /// Panics if the staging lock is poisoned.
    pub(crate) fn update_functions(&self, functions: Arc<FunctionContext>) -> IndexResult<()> {
        let mut staging = self.staging.lock().expect("index staging lock poisoned");
        if S::FOLDS_FUNCTIONS {
            self.publish(&staging.published_documents, &functions)?;
        } else {
            let snapshot = self.snapshot();
            self.swap(snapshot, Arc::clone(&functions), staging.published_documents.len());
        }
        staging.functions = functions;
        debug!(functions = ?staging.functions, "function context replaced");
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the staging lock is poisoned.
    pub(crate) fn set_mode(&self, mode: IndexMode) -> IndexResult<()> {
        let mut staging = self.staging.lock().expect("index staging lock poisoned");
        if staging.mode == mode {
            return Ok(());
        }
        if mode == IndexMode::Live {
            self.publish(&staging.documents, &staging.functions)?;
            staging.published_documents = staging.documents.clone();
        }
        staging.mode = mode;
        debug!(?mode, "index mode switched");
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the staging lock is poisoned.
    pub(crate) fn mode(&self) -> IndexMode {
        self.staging.lock().expect("index staging lock poisoned").mode
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Builds outside the reader lock, then swaps the snapshot in.
    fn publish(&self, documents: &Documents, functions: &Arc<FunctionContext>) -> IndexResult<()> {
        let snapshot = S::build(documents, functions).inspect_err(|err| {
            warn!(error = %err, documents = documents.len(), "snapshot rejected");
        })?;
        self.swap(Arc::new(snapshot), Arc::clone(functions), documents.len());
        Ok(())
    }

    /// Replaces the publication, then ticks the generation so watchers
    /// re-read a publication at least as new as this one.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot lock is poisoned.
    fn swap(&self, snapshot: Arc<S>, functions: Arc<FunctionContext>, documents: usize) {
        *self
            .published
            .write()
            .expect("index snapshot lock poisoned") = Arc::new(Published {
            snapshot,
            functions,
        });
        self.generation.send_modify(|generation| *generation += 1);
        debug!(
            documents,
            generation = *self.generation.borrow(),
            "index snapshot published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexError, TargetExpr};
    use pdp_eval::StaticBody;
    use pdp_primitives::AuthorizationDecision;

    /// Snapshot listing its keys that refuses any key starting with `bad`.
    #[derive(Debug, Default)]
    struct Keys(Vec<String>);

    /// Like [`Keys`] without depending on the registry.
    #[derive(Debug, Default)]
    struct Plain(Vec<String>);

    impl Snapshot for Plain {
        const FOLDS_FUNCTIONS: bool = false;

        fn empty() -> Self {
            Self::default()
        }

        fn build(documents: &Documents, _functions: &Arc<FunctionContext>) -> IndexResult<Self> {
            Ok(Self(documents.keys().map(ToString::to_string).collect()))
        }

        fn retrieve(&self, _ctx: &EvaluationContext) -> RetrievalResult {
            RetrievalResult::new()
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    impl Snapshot for Keys {
        const FOLDS_FUNCTIONS: bool = true;

        fn empty() -> Self {
            Self::default()
        }

        fn build(documents: &Documents, _functions: &Arc<FunctionContext>) -> IndexResult<Self> {
            let keys: Vec<String> = documents.keys().map(ToString::to_string).collect();
            if keys.iter().any(|key| key.starts_with("bad")) {
                return Err(IndexError::corrupted("refused"));
            }
            Ok(Self(keys))
        }

        fn retrieve(&self, _ctx: &EvaluationContext) -> RetrievalResult {
            RetrievalResult::new()
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    fn document() -> Arc<PolicyDocument> {
        Arc::new(
            PolicyDocument::new(
                "doc",
                TargetExpr::always(),
                StaticBody::new(AuthorizationDecision::permit()),
            )
            .unwrap(),
        )
    }

    fn put(core: &IndexCore<Keys>, key: &str) -> IndexResult<()> {
        core.mutate(|documents| {
            documents.insert(key.parse().unwrap(), document());
        })
    }

    fn published(core: &IndexCore<Keys>) -> Vec<String> {
        core.snapshot().0.clone()
    }

    #[test]
    fn failed_builds_keep_the_previous_snapshot() {
        let core = IndexCore::<Keys>::new(Arc::new(FunctionContext::new()));
        let generation = core.subscribe();
        put(&core, "a").unwrap();

        let err = put(&core, "bad").unwrap_err();
        assert!(matches!(err, IndexError::Corrupted { .. }));
        assert_eq!(published(&core), ["a"]);
        assert_eq!(*generation.borrow(), 1);

        // the rejected document was not committed either
        put(&core, "b").unwrap();
        assert_eq!(published(&core), ["a", "b"]);
    }

    #[test]
    fn static_mode_stages_until_switched_back() {
        let core = IndexCore::<Keys>::new(Arc::new(FunctionContext::new()));
        let generation = core.subscribe();
        put(&core, "a").unwrap();

        core.set_mode(IndexMode::Static).unwrap();
        put(&core, "b").unwrap();
        put(&core, "c").unwrap();
        assert_eq!(published(&core), ["a"]);
        assert_eq!(core.mode(), IndexMode::Static);

        core.set_mode(IndexMode::Live).unwrap();
        assert_eq!(published(&core), ["a", "b", "c"]);
        assert_eq!(*generation.borrow(), 2);
    }

    #[test]
    fn failed_switch_to_live_stays_static() {
        let core = IndexCore::<Keys>::new(Arc::new(FunctionContext::new()));
        core.set_mode(IndexMode::Static).unwrap();
        put(&core, "bad").unwrap();

        assert!(core.set_mode(IndexMode::Live).is_err());
        assert_eq!(core.mode(), IndexMode::Static);
        assert!(published(&core).is_empty());
    }

    #[test]
    fn function_updates_rebuild_only_the_published_set() {
        let core = IndexCore::<Keys>::new(Arc::new(FunctionContext::new()));
        let generation = core.subscribe();
        put(&core, "a").unwrap();

        core.set_mode(IndexMode::Static).unwrap();
        put(&core, "b").unwrap();
        core.update_functions(Arc::new(FunctionContext::standard()))
            .unwrap();
        assert_eq!(*generation.borrow(), 2);
        assert_eq!(published(&core), ["a"]);

        core.set_mode(IndexMode::Live).unwrap();
        assert_eq!(published(&core), ["a", "b"]);
    }

    #[test]
    fn registry_updates_are_published_with_the_snapshot() {
        let core = IndexCore::<Plain>::new(Arc::new(FunctionContext::new()));
        let generation = core.subscribe();
        core.mutate(|documents| {
            documents.insert("a".parse().unwrap(), document());
        })
        .unwrap();
        let before = core.snapshot();

        let functions = Arc::new(FunctionContext::standard());
        core.update_functions(Arc::clone(&functions)).unwrap();
        assert_eq!(*generation.borrow(), 2);
        assert!(Arc::ptr_eq(&core.snapshot(), &before));
        assert!(Arc::ptr_eq(&core.functions(), &functions));
    }

    #[test]
    fn bound_retrievals_use_the_published_registry() {
        let core = IndexCore::<Plain>::new(Arc::new(FunctionContext::new()));
        let functions = Arc::new(FunctionContext::standard());
        core.update_functions(Arc::clone(&functions)).unwrap();

        let subscription = AuthorizationSubscription::default();
        let bound = core.retrieve_for(&subscription, &Map::new());
        let ctx = bound.context().unwrap();
        assert!(std::ptr::eq(ctx.functions(), functions.as_ref()));
        assert!(!bound.result().errors_in_target());

        let mut reserved = Map::new();
        reserved.insert("action".to_owned(), Value::Null);
        let bound = core.retrieve_for(&subscription, &reserved);
        assert!(bound.context().is_err());
        assert!(bound.result().errors_in_target());
    }
}
