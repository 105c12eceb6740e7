use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use pdp_combinators::{CombiningAlgorithm, DocumentCombinator};
use pdp_eval::{
    AttributeEquals, DecisionStream, EvaluationContext, FunctionContext, PolicyBody, StaticBody,
};
use pdp_index::{DocumentIndex, PolicyDocument, RetrievalResult, SimpleIndex, TargetExpr};
use pdp_primitives::{AuthorizationDecision, AuthorizationSubscription, Decision};
use serde_json::{Map, json};

/// Stream that counts its own drop.
struct Tracked {
    inner: mpsc::UnboundedReceiver<AuthorizationDecision>,
    released: Arc<AtomicUsize>,
}

impl Stream for Tracked {
    type Item = AuthorizationDecision;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Body whose decisions are pushed by the test.
#[derive(Debug)]
struct ChannelBody {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<AuthorizationDecision>>>,
    released: Arc<AtomicUsize>,
    evaluations: Arc<AtomicUsize>,
}

impl PolicyBody for ChannelBody {
    fn evaluate(&self, _ctx: Arc<EvaluationContext>) -> DecisionStream {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let receiver = self.receiver.lock().unwrap().take();
        match receiver {
            Some(inner) => Tracked {
                inner,
                released: Arc::clone(&self.released),
            }
            .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

struct Harness {
    index: SimpleIndex,
    released: Arc<AtomicUsize>,
    evaluations: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            index: SimpleIndex::new(),
            released: Arc::new(AtomicUsize::new(0)),
            evaluations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn channel(&self, key: &str) -> mpsc::UnboundedSender<AuthorizationDecision> {
        let (tx, rx) = mpsc::unbounded();
        let body = ChannelBody {
            receiver: Mutex::new(Some(rx)),
            released: Arc::clone(&self.released),
            evaluations: Arc::clone(&self.evaluations),
        };
        self.publish(key, TargetExpr::always(), body);
        tx
    }

    fn publish(&self, key: &str, target: TargetExpr, body: impl PolicyBody + 'static) {
        let document = PolicyDocument::new(key, target, body).unwrap();
        self.index.put(key.parse().unwrap(), Arc::new(document)).unwrap();
    }

    fn retrieve(&self) -> (RetrievalResult, Arc<EvaluationContext>) {
        let subscription =
            AuthorizationSubscription::new(json!("willi"), json!("read"), json!({}));
        let ctx = Arc::new(
            EvaluationContext::new(&subscription, &Map::new(), Arc::new(FunctionContext::new()))
                .unwrap(),
        );
        (self.index.retrieve(&ctx), ctx)
    }

    fn combine(&self, algorithm: CombiningAlgorithm) -> DecisionStream {
        let (retrieval, ctx) = self.retrieve();
        DocumentCombinator::new(algorithm).combine(&retrieval, ctx)
    }
}

async fn next_decision(stream: &mut DecisionStream) -> Decision {
    stream.next().await.expect("a decision").decision()
}

#[tokio::test]
async fn deny_overrides_a_permit() {
    let harness = Harness::new();
    let a = harness.channel("a");
    let b = harness.channel("b");
    let mut combined = harness.combine(CombiningAlgorithm::DenyOverrides);

    a.unbounded_send(AuthorizationDecision::permit()).unwrap();
    b.unbounded_send(AuthorizationDecision::deny()).unwrap();
    assert_eq!(next_decision(&mut combined).await, Decision::Deny);

    // recombines with the latest value of every document
    b.unbounded_send(AuthorizationDecision::not_applicable()).unwrap();
    assert_eq!(next_decision(&mut combined).await, Decision::Permit);
}

#[tokio::test]
async fn target_errors_turn_permits_indeterminate() {
    let harness = Harness::new();
    let a = harness.channel("a");
    harness.publish(
        "broken",
        TargetExpr::test(AttributeEquals::new(
            "resource.owner".parse().unwrap(),
            json!("willi"),
        )),
        StaticBody::new(AuthorizationDecision::deny()),
    );

    let (retrieval, _) = harness.retrieve();
    assert!(retrieval.errors_in_target());
    assert_eq!(retrieval.len(), 1);

    let mut combined = harness.combine(CombiningAlgorithm::DenyOverrides);
    a.unbounded_send(AuthorizationDecision::permit()).unwrap();
    assert_eq!(next_decision(&mut combined).await, Decision::Indeterminate);
}

#[tokio::test]
async fn dropping_the_combined_stream_releases_every_document() {
    let harness = Harness::new();
    let senders: Vec<_> = ["a", "b", "c"].iter().map(|key| harness.channel(key)).collect();
    let mut combined = harness.combine(CombiningAlgorithm::PermitOverrides);

    for sender in &senders {
        sender.unbounded_send(AuthorizationDecision::deny()).unwrap();
    }
    assert_eq!(next_decision(&mut combined).await, Decision::Deny);
    assert_eq!(harness.evaluations.load(Ordering::SeqCst), 3);

    drop(combined);
    assert_eq!(harness.released.load(Ordering::SeqCst), 3);
    for sender in &senders {
        assert!(sender.is_closed());
        assert!(sender.unbounded_send(AuthorizationDecision::permit()).is_err());
    }
    assert_eq!(harness.evaluations.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_match_set_emits_once_and_completes() {
    let harness = Harness::new();
    let decisions: Vec<_> = harness
        .combine(CombiningAlgorithm::DenyUnlessPermit)
        .collect()
        .await;
    assert_eq!(decisions, [AuthorizationDecision::deny()]);

    harness.publish(
        "broken",
        TargetExpr::test(AttributeEquals::new(
            "environment.zone".parse().unwrap(),
            json!("eu"),
        )),
        StaticBody::new(AuthorizationDecision::permit()),
    );
    let decisions: Vec<_> = harness
        .combine(CombiningAlgorithm::DenyOverrides)
        .collect()
        .await;
    assert_eq!(decisions, [AuthorizationDecision::indeterminate()]);
}

#[tokio::test]
async fn only_one_applicable_sees_overlapping_documents() {
    let harness = Harness::new();
    harness.publish(
        "one",
        TargetExpr::always(),
        StaticBody::new(AuthorizationDecision::permit()),
    );
    harness.publish(
        "two",
        TargetExpr::always(),
        StaticBody::new(AuthorizationDecision::deny()),
    );
    let decisions: Vec<_> = harness
        .combine(CombiningAlgorithm::OnlyOneApplicable)
        .collect()
        .await;
    assert_eq!(decisions, [AuthorizationDecision::indeterminate()]);

    let decisions: Vec<_> = harness
        .combine(CombiningAlgorithm::FirstApplicable)
        .collect()
        .await;
    assert_eq!(decisions, [AuthorizationDecision::permit()]);
}
