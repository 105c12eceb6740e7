//! Bitmask strategy: predicates shared across documents are evaluated at
//! most once per request, and only while they can still change the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use pdp_eval::{Bool, EvaluationContext, FunctionContext};
use pdp_primitives::{AuthorizationSubscription, DocumentKey};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::store::{Documents, IndexCore, Snapshot};
use crate::{
    Bitmask, BoundRetrieval, DocumentIndex, IndexError, IndexMode, IndexResult, PolicyDocument,
    Predicate, RetrievalResult, TriState,
};

#[derive(Debug, Clone)]
struct IndexedDocument {
    key: DocumentKey,
    document: Arc<PolicyDocument>,
    conjunctions: Bitmask,
}

#[derive(Debug, Default)]
pub(crate) struct ImprovedSnapshot {
    predicates: Vec<Predicate>,
    documents: Vec<IndexedDocument>,
    conjunction_count: usize,
}

impl ImprovedSnapshot {
    fn validate(&self) -> IndexResult<()> {
        for predicate in &self.predicates {
            predicate.validate(self.conjunction_count)?;
        }
        for indexed in &self.documents {
            if indexed.conjunctions.len() != self.conjunction_count {
                return Err(IndexError::corrupted(format!(
                    "document `{}` sized for a different snapshot",
                    indexed.key
                )));
            }
        }
        Ok(())
    }

    /// Picks the unevaluated predicate referenced by the most alive
    /// conjunctions; ties go to the lowest predicate id.
    fn next_predicate(&self, evaluated: &[bool], alive: &Bitmask) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (id, predicate) in self.predicates.iter().enumerate() {
            if evaluated[id] {
                continue;
            }
            let references = predicate.conjunctions().intersection_count(alive);
            if references > 0 && best.is_none_or(|(_, most)| references > most) {
                best = Some((id, references));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Runs the elimination loop, returning the alive and the unknown
    /// conjunctions.
    fn evaluate(&self, ctx: &EvaluationContext) -> (Bitmask, Bitmask) {
        let mut alive = Bitmask::full(self.conjunction_count);
        let mut unknown = Bitmask::new(self.conjunction_count);
        let mut evaluated = vec![false; self.predicates.len()];

        while let Some(id) = self.next_predicate(&evaluated, &alive) {
            evaluated[id] = true;
            let predicate = &self.predicates[id];
            match predicate.evaluate(ctx) {
                TriState::True => {
                    alive.subtract(predicate.false_for_true_predicate());
                    alive.subtract(predicate.contradicted());
                }
                TriState::False => {
                    alive.subtract(predicate.false_for_false_predicate());
                    alive.subtract(predicate.contradicted());
                }
                TriState::Failed(err) => {
                    debug!(
                        predicate = predicate.key(),
                        error = %err,
                        "predicate evaluation failed"
                    );
                    unknown.union_with(predicate.conjunctions());
                }
            }
        }
        (alive, unknown)
    }
}

impl Snapshot for ImprovedSnapshot {
    const FOLDS_FUNCTIONS: bool = true;

    fn empty() -> Self {
        Self::default()
    }

    fn build(documents: &Documents, functions: &Arc<FunctionContext>) -> IndexResult<Self> {
        let folding = EvaluationContext::for_functions(Arc::clone(functions));

        let mut leaves: Vec<(Arc<dyn Bool>, String)> = Vec::new();
        let mut references: Vec<Vec<(usize, bool)>> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut owners: Vec<(DocumentKey, Arc<PolicyDocument>, Vec<usize>)> = Vec::new();
        let mut conjunction_count = 0;

        for (key, document) in documents {
            let formula = document.formula().reduce_constants(&folding);
            let mut ids = Vec::with_capacity(formula.clauses().len());
            for clause in formula.clauses() {
                let conjunction = conjunction_count;
                conjunction_count += 1;
                ids.push(conjunction);
                for literal in clause.literals() {
                    let id = *by_key.entry(literal.key().to_owned()).or_insert_with(|| {
                        leaves.push((Arc::clone(literal.expression()), literal.key().to_owned()));
                        references.push(Vec::new());
                        leaves.len() - 1
                    });
                    references[id].push((conjunction, literal.is_negated()));
                }
            }
            owners.push((key.clone(), Arc::clone(document), ids));
        }

        let mut predicates = Vec::with_capacity(leaves.len());
        for ((expression, key), refs) in leaves.into_iter().zip(references) {
            let mut predicate = Predicate::new(expression, key, conjunction_count);
            for (conjunction, negated) in refs {
                predicate.reference(conjunction, negated)?;
            }
            predicates.push(predicate);
        }

        let documents = owners
            .into_iter()
            .map(|(key, document, ids)| {
                let mut conjunctions = Bitmask::new(conjunction_count);
                for id in ids {
                    conjunctions.insert(id);
                }
                IndexedDocument {
                    key,
                    document,
                    conjunctions,
                }
            })
            .collect();

        let snapshot = Self {
            predicates,
            documents,
            conjunction_count,
        };
        snapshot.validate()?;
        trace!(
            predicates = snapshot.predicates.len(),
            conjunctions = conjunction_count,
            "bitmask index built"
        );
        Ok(snapshot)
    }

    fn retrieve(&self, ctx: &EvaluationContext) -> RetrievalResult {
        let (alive, unknown) = self.evaluate(ctx);

        let mut satisfied = alive.clone();
        satisfied.subtract(&unknown);
        let mut undecided = alive;
        undecided.intersect_with(&unknown);

        let mut result = RetrievalResult::new();
        for indexed in &self.documents {
            if indexed.conjunctions.intersects(&satisfied) {
                result.push(indexed.key.clone(), Arc::clone(&indexed.document));
            } else if indexed.conjunctions.intersects(&undecided) {
                result.mark_error();
            }
        }
        result
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Index sharing predicate evaluations through conjunction bit-vectors.
///
/// Every snapshot build folds request-independent literals under the
/// index's function registry, so retrievals must use the same registry.
#[derive(Debug)]
pub struct ImprovedIndex {
    core: IndexCore<ImprovedSnapshot>,
}

impl ImprovedIndex {
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

    /// Predicates of the published snapshot, by predicate id.
    #[must_use]
    pub fn predicates(&self) -> Vec<Predicate> {
        self.core.snapshot().predicates.clone()
    }

    /// Number of conjunctions in the published snapshot.
    #[must_use]
    pub fn conjunction_count(&self) -> usize {
        self.core.snapshot().conjunction_count
    }
}

impl Default for ImprovedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentIndex for ImprovedIndex {
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

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::TargetExpr;
    use pdp_eval::{
        Argument, AttributeEquals, EvalResult, EvaluationError, FunctionPredicate, StaticBody,
    };
    use pdp_primitives::{AuthorizationDecision, AuthorizationSubscription};
    use serde_json::{Map, json};

    #[derive(Debug)]
    struct Counting {
        key: &'static str,
        outcome: Option<bool>,
        calls: Arc<AtomicUsize>,
    }

    impl Bool for Counting {
        fn evaluate(&self, _ctx: &EvaluationContext) -> EvalResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .ok_or_else(|| EvaluationError::function(self.key, "unavailable"))
        }

        fn structural_key(&self) -> String {
            self.key.to_owned()
        }
    }

    fn counting(key: &'static str, outcome: Option<bool>, calls: &Arc<AtomicUsize>) -> TargetExpr {
        TargetExpr::test(Counting {
            key,
            outcome,
            calls: Arc::clone(calls),
        })
    }

    fn eq(path: &str, value: &str) -> TargetExpr {
        TargetExpr::test(AttributeEquals::new(path.parse().unwrap(), json!(value)))
    }

    fn document(name: &str, target: TargetExpr) -> Arc<PolicyDocument> {
        Arc::new(
            PolicyDocument::new(name, target, StaticBody::new(AuthorizationDecision::permit()))
                .unwrap(),
        )
    }

    fn ctx(subject: &str) -> EvaluationContext {
        let subscription =
            AuthorizationSubscription::new(json!(subject), json!("read"), json!("something"));
        EvaluationContext::new(&subscription, &Map::new(), Arc::new(FunctionContext::new()))
            .unwrap()
    }

    fn willi_reads() -> ImprovedIndex {
        let index = ImprovedIndex::new();
        index
            .put(
                "willi-reads".parse().unwrap(),
                document("willi-reads", eq("subject", "willi").and(eq("action", "read"))),
            )
            .unwrap();
        index
    }

    #[test]
    fn matching_request_retrieves_the_document() {
        let result = willi_reads().retrieve(&ctx("willi"));
        assert_eq!(
            result.keys().map(DocumentKey::as_str).collect::<Vec<_>>(),
            ["willi-reads"]
        );
        assert!(!result.errors_in_target());
    }

    #[test]
    fn other_subject_matches_nothing() {
        let result = willi_reads().retrieve(&ctx("bob"));
        assert!(result.is_empty());
        assert!(!result.errors_in_target());
    }

    #[test]
    fn unresolvable_attribute_sets_the_error_flag() {
        let index = ImprovedIndex::new();
        index
            .put(
                "owner".parse().unwrap(),
                document("owner", eq("resource.owner", "willi")),
            )
            .unwrap();

        let result = index.retrieve(&ctx("willi"));
        assert!(result.is_empty());
        assert!(result.errors_in_target());
    }

    #[test]
    fn shared_predicates_are_evaluated_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let index = ImprovedIndex::new();
        for name in ["a", "b", "c"] {
            index
                .put(
                    name.parse().unwrap(),
                    document(name, counting("shared", Some(true), &calls)),
                )
                .unwrap();
        }

        assert_eq!(index.predicates().len(), 1);
        assert_eq!(index.retrieve(&ctx("willi")).len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eliminated_conjunctions_skip_their_predicates() {
        let gate = Arc::new(AtomicUsize::new(0));
        let tail = Arc::new(AtomicUsize::new(0));
        let index = ImprovedIndex::new();
        for name in ["a", "b"] {
            index
                .put(
                    name.parse().unwrap(),
                    document(
                        name,
                        counting("gate", Some(false), &gate).and(counting(
                            if name == "a" { "tail-a" } else { "tail-b" },
                            Some(true),
                            &tail,
                        )),
                    ),
                )
                .unwrap();
        }

        assert!(index.retrieve(&ctx("willi")).is_empty());
        assert_eq!(gate.load(Ordering::SeqCst), 1);
        assert_eq!(tail.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_only_flag_documents_that_could_not_be_decided() {
        let calls = Arc::new(AtomicUsize::new(0));
        let index = ImprovedIndex::new();
        // fails, but the other disjunct holds
        index
            .put(
                "rescued".parse().unwrap(),
                document(
                    "rescued",
                    counting("broken", None, &calls).or(eq("subject", "willi")),
                ),
            )
            .unwrap();
        // fails, but the other conjunct is false
        index
            .put(
                "refuted".parse().unwrap(),
                document(
                    "refuted",
                    counting("broken", None, &calls).and(eq("subject", "bob")),
                ),
            )
            .unwrap();

        let result = index.retrieve(&ctx("willi"));
        assert_eq!(
            result.keys().map(DocumentKey::as_str).collect::<Vec<_>>(),
            ["rescued"]
        );
        assert!(!result.errors_in_target());
    }

    #[test]
    fn contradicted_conjunctions_fail_only_with_their_predicate() {
        let index = ImprovedIndex::new();
        let willi = eq("subject", "willi");
        let owner = eq("resource.owner", "willi");
        index
            .put("never".parse().unwrap(), document("never", willi.clone().and(!willi)))
            .unwrap();
        index
            .put("unknown".parse().unwrap(), document("unknown", owner.clone().and(!owner)))
            .unwrap();

        let predicates = index.predicates();
        assert_eq!(predicates.len(), 2);
        assert!(predicates.iter().all(|p| p.contradicted().count() == 1));

        let result = index.retrieve(&ctx("willi"));
        assert!(result.is_empty());
        assert!(result.errors_in_target());
    }

    #[test]
    fn predicates_respect_the_bitmask_invariant() {
        let index = ImprovedIndex::new();
        let a = eq("subject", "a");
        let b = eq("action", "read");
        let c = eq("resource", "x");
        index
            .put("one".parse().unwrap(), document("one", a.clone().and(!b.clone())))
            .unwrap();
        index
            .put("two".parse().unwrap(), document("two", b.or(c.and(!a))))
            .unwrap();

        let count = index.conjunction_count();
        assert_eq!(count, 3);
        for predicate in index.predicates() {
            predicate.validate(count).unwrap();
            let mut union = predicate.false_for_true_predicate().clone();
            union.union_with(predicate.false_for_false_predicate());
            union.union_with(predicate.contradicted());
            assert_eq!(&union, predicate.conjunctions());
        }
    }

    #[test]
    fn immutable_literals_fold_under_the_index_functions() {
        let flag = FunctionPredicate::new("feature.enabled", vec![Argument::Literal(json!(1))]);
        let index = ImprovedIndex::new();
        index
            .put(
                "feature".parse().unwrap(),
                document("feature", TargetExpr::test(flag)),
            )
            .unwrap();
        // unknown function: kept as a predicate and failing per request
        assert_eq!(index.predicates().len(), 1);

        let functions = Arc::new(
            FunctionContext::new().with_function("feature.enabled", |_| Ok(json!(true))),
        );
        index.update_function_context(Arc::clone(&functions)).unwrap();
        assert!(index.predicates().is_empty());
        assert_eq!(index.conjunction_count(), 1);

        let ctx = EvaluationContext::new(
            &AuthorizationSubscription::default(),
            &Map::new(),
            functions,
        )
        .unwrap();
        assert_eq!(index.retrieve(&ctx).len(), 1);
    }
}
