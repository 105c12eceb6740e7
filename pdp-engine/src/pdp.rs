//! Embedded decision point wiring configuration, retrieval and combination.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use pdp_combinators::CombineLatest;
use pdp_config::{ConfigurationProvider, PdpConfiguration};
use pdp_eval::{DecisionStream, EvaluationContext, FunctionContext};
use pdp_index::{DocumentUpdate, IndexResult, PolicyDocument, PolicyRetrievalPoint};
use pdp_primitives::{
    AuthorizationDecision, AuthorizationSubscription, DocumentKey,
    IdentifiableAuthorizationDecision, MultiAuthorizationDecision, MultiAuthorizationSubscription,
};
use pdp_telemetry::{DecisionObserver, TracingDecisionObserver};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::PdpResult;
use crate::decision::DecisionLoop;

/// State shared by the decision point and every open decision stream.
pub(crate) struct Shared {
    pub(crate) prp: PolicyRetrievalPoint,
    pub(crate) config: watch::Sender<Arc<PdpConfiguration>>,
    pub(crate) observer: Arc<dyn DecisionObserver>,
}

/// Builder for [`EmbeddedPolicyDecisionPoint`] instances.
pub struct PdpBuilder {
    config: PdpConfiguration,
    functions: FunctionContext,
    observer: Option<Arc<dyn DecisionObserver>>,
    documents: Vec<(DocumentKey, Arc<PolicyDocument>)>,
}

impl PdpBuilder {
    /// Starts a builder with the default configuration and standard functions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PdpConfiguration::new(),
            functions: FunctionContext::standard(),
            observer: None,
            documents: Vec::new(),
        }
    }

    /// Uses the supplied configuration.
    #[must_use]
    pub fn with_configuration(mut self, config: PdpConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Loads the configuration from a provider.
    ///
    /// # Errors
    ///
    /// Propagates provider failures as [`PdpError::Config`](crate::PdpError::Config).
    pub async fn with_provider(mut self, provider: &dyn ConfigurationProvider) -> PdpResult<Self> {
        self.config = provider.load().await?;
        Ok(self)
    }

    /// Replaces the function registry.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionContext) -> Self {
        self.functions = functions;
        self
    }

    /// Installs the decision observer. Defaults to [`TracingDecisionObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Adds a document to the initial document set.
    #[must_use]
    pub fn with_document(mut self, key: DocumentKey, document: PolicyDocument) -> Self {
        self.documents.push((key, Arc::new(document)));
        self
    }

    /// Builds the decision point and publishes the initial documents at once.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Config`](crate::PdpError::Config) when the
    /// configuration is invalid and [`PdpError::Index`](crate::PdpError::Index)
    /// when the initial documents cannot be indexed.
    pub fn build(self) -> PdpResult<EmbeddedPolicyDecisionPoint> {
        self.config.validate()?;
        let index = self.config.index().build(Arc::new(self.functions));
        let prp = PolicyRetrievalPoint::new(index);
        prp.load(self.documents)?;

        info!(
            index = %self.config.index(),
            algorithm = %self.config.algorithm(),
            documents = prp.index().len(),
            "policy decision point ready"
        );

        let (config, _) = watch::channel(Arc::new(self.config));
        Ok(EmbeddedPolicyDecisionPoint {
            shared: Arc::new(Shared {
                prp,
                config,
                observer: self
                    .observer
                    .unwrap_or_else(|| Arc::new(TracingDecisionObserver)),
            }),
        })
    }
}

impl Default for PdpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process policy decision point producing continuous decision streams.
///
/// Every stream re-evaluates its subscription whenever the published
/// document set, the configuration, or the function registry changes, and
/// only emits decisions that differ from the previous one. Clones share the
/// same index and configuration.
#[derive(Clone)]
pub struct EmbeddedPolicyDecisionPoint {
    shared: Arc<Shared>,
}

impl EmbeddedPolicyDecisionPoint {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> PdpBuilder {
        PdpBuilder::new()
    }

    /// Opens a continuous decision stream for one subscription.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Context`](crate::PdpError::Context) when the
    /// subscription cannot be bound under the current variables. Later
    /// context failures surface as an indeterminate decision instead.
    pub fn decide(&self, subscription: AuthorizationSubscription) -> PdpResult<DecisionStream> {
        let config = self.configuration();
        EvaluationContext::new(&subscription, config.variables(), self.function_context())?;
        debug!(
            subject = %subscription.subject(),
            action = %subscription.action(),
            "opening decision stream"
        );
        Ok(DecisionLoop::new(Arc::clone(&self.shared), subscription).into_stream())
    }

    /// Returns the first decision for a subscription and closes the stream.
    ///
    /// # Errors
    ///
    /// Same as [`decide`](Self::decide).
    pub async fn decide_once(
        &self,
        subscription: AuthorizationSubscription,
    ) -> PdpResult<AuthorizationDecision> {
        let mut decisions = self.decide(subscription)?;
        Ok(decisions
            .next()
            .await
            .unwrap_or_else(AuthorizationDecision::indeterminate))
    }

    /// Streams a combined decision for every member of a multi-subscription.
    ///
    /// Nothing is emitted until every member has decided once; afterwards a
    /// full snapshot follows every member change. An empty multi-subscription
    /// emits one empty decision and completes.
    ///
    /// # Errors
    ///
    /// Fails when any member fails [`decide`](Self::decide).
    pub fn decide_all(
        &self,
        subscriptions: &MultiAuthorizationSubscription,
    ) -> PdpResult<BoxStream<'static, MultiAuthorizationDecision>> {
        if subscriptions.is_empty() {
            return Ok(stream::iter([MultiAuthorizationDecision::new()]).boxed());
        }
        let members = self.identifiable_streams(subscriptions)?;
        Ok(CombineLatest::new(members)
            .map(|snapshot| snapshot.into_iter().collect::<MultiAuthorizationDecision>())
            .boxed())
    }

    /// Streams every member decision individually, tagged with its id.
    ///
    /// An empty multi-subscription completes without emitting.
    ///
    /// # Errors
    ///
    /// Fails when any member fails [`decide`](Self::decide).
    pub fn decide_each(
        &self,
        subscriptions: &MultiAuthorizationSubscription,
    ) -> PdpResult<BoxStream<'static, IdentifiableAuthorizationDecision>> {
        let members = self.identifiable_streams(subscriptions)?;
        Ok(stream::select_all(members).boxed())
    }

    fn identifiable_streams(
        &self,
        subscriptions: &MultiAuthorizationSubscription,
    ) -> PdpResult<Vec<BoxStream<'static, IdentifiableAuthorizationDecision>>> {
        subscriptions
            .iter()
            .map(|(id, subscription)| {
                let id = *id;
                let decisions = self.decide(subscription.clone())?;
                Ok(decisions
                    .map(move |decision| IdentifiableAuthorizationDecision::new(id, decision))
                    .boxed())
            })
            .collect()
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn configuration(&self) -> Arc<PdpConfiguration> {
        Arc::clone(&self.shared.config.borrow())
    }

    /// Replaces the active configuration; open streams re-evaluate.
    ///
    /// The index strategy is fixed when the decision point is built; a
    /// different strategy in `config` is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Config`](crate::PdpError::Config) when the
    /// configuration is invalid; the previous one stays active.
    pub fn update_configuration(&self, config: PdpConfiguration) -> PdpResult<()> {
        config.validate()?;
        let previous = self.configuration();
        if previous.index() != config.index() {
            warn!(
                active = %previous.index(),
                requested = %config.index(),
                "index strategy cannot change at runtime; keeping the active one"
            );
        }
        info!(
            algorithm = %config.algorithm(),
            variables = config.variables().len(),
            "configuration updated"
        );
        self.shared.config.send_replace(Arc::new(config));
        Ok(())
    }

    /// Returns the function registry of the current index publication.
    #[must_use]
    pub fn function_context(&self) -> Arc<FunctionContext> {
        self.shared.prp.index().function_context()
    }

    /// Replaces the function registry; open streams re-evaluate.
    ///
    /// The index publishes the registry together with its snapshot, so no
    /// evaluation ever mixes targets matched under one registry with bodies
    /// evaluated under another.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Index`](crate::PdpError::Index) when the index
    /// cannot be rebuilt under the new registry; the previous one stays
    /// active.
    pub fn update_function_context(&self, functions: FunctionContext) -> PdpResult<()> {
        self.shared
            .prp
            .index()
            .update_function_context(Arc::new(functions))?;
        info!("function registry updated");
        Ok(())
    }

    /// Returns the retrieval point feeding this decision point.
    #[must_use]
    pub fn retrieval_point(&self) -> &PolicyRetrievalPoint {
        &self.shared.prp
    }

    /// Publishes or replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Index`](crate::PdpError::Index) when the document
    /// cannot be indexed; the published set is unchanged.
    pub fn publish(&self, key: DocumentKey, document: PolicyDocument) -> PdpResult<()> {
        self.shared.prp.apply(DocumentUpdate::Publish {
            key,
            document: Arc::new(document),
        })?;
        Ok(())
    }

    /// Withdraws a document. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PdpError::Index`](crate::PdpError::Index) when the remaining
    /// documents cannot be indexed.
    pub fn withdraw(&self, key: DocumentKey) -> PdpResult<()> {
        self.shared.prp.apply(DocumentUpdate::Withdraw { key })?;
        Ok(())
    }

    /// Follows a stream of document updates on a background task.
    pub fn follow<S>(&self, updates: S) -> JoinHandle<IndexResult<()>>
    where
        S: futures::Stream<Item = DocumentUpdate> + Send + 'static,
    {
        self.shared.prp.follow(updates)
    }
}

impl std::fmt::Debug for EmbeddedPolicyDecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedPolicyDecisionPoint")
            .field("index", self.shared.prp.index())
            .field("configuration", &self.configuration())
            .finish_non_exhaustive()
    }
}
