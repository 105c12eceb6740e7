//! Re-evaluating decision stream for a single subscription.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use pdp_combinators::DocumentCombinator;
use pdp_config::PdpConfiguration;
use pdp_eval::DecisionStream;
use pdp_primitives::{AuthorizationDecision, AuthorizationSubscription};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::pdp::Shared;

/// Drives one subscription: evaluates it, then restarts the evaluation on
/// every configuration or index publication change, registry replacements
/// included. Changes win over pending decisions of the superseded
/// evaluation.
pub(crate) struct DecisionLoop {
    shared: Arc<Shared>,
    subscription: AuthorizationSubscription,
    config: watch::Receiver<Arc<PdpConfiguration>>,
    generation: watch::Receiver<u64>,
    config_open: bool,
    generation_open: bool,
    current: DecisionStream,
    current_done: bool,
    last: Option<AuthorizationDecision>,
}

impl DecisionLoop {
    pub(crate) fn new(shared: Arc<Shared>, subscription: AuthorizationSubscription) -> Self {
        let config = shared.config.subscribe();
        let generation = shared.prp.index().subscribe();
        let mut this = Self {
            shared,
            subscription,
            config,
            generation,
            config_open: true,
            generation_open: true,
            current: stream::empty().boxed(),
            current_done: true,
            last: None,
        };
        this.current = this.evaluate();
        this.current_done = false;
        this
    }

    pub(crate) fn into_stream(self) -> DecisionStream {
        stream::unfold(self, |mut state| async move {
            let decision = state.next().await?;
            Some((decision, state))
        })
        .boxed()
    }

    /// Starts a fresh evaluation against the latest configuration and one
    /// index publication: the bodies run under the registry the matched
    /// targets were retrieved with.
    fn evaluate(&mut self) -> DecisionStream {
        let config = Arc::clone(&self.config.borrow_and_update());
        // Anything published after this point triggers another restart.
        self.generation.mark_unchanged();

        let (ctx, retrieval) = self
            .shared
            .prp
            .retrieve_for(&self.subscription, config.variables())
            .into_parts();
        match ctx {
            Ok(ctx) => {
                debug!(
                    matches = retrieval.len(),
                    errors_in_target = retrieval.errors_in_target(),
                    algorithm = %config.algorithm(),
                    "documents retrieved"
                );
                DocumentCombinator::new(config.algorithm()).combine(&retrieval, ctx)
            }
            Err(err) => {
                warn!(error = %err, "subscription cannot be bound under the active variables");
                stream::iter([AuthorizationDecision::indeterminate()]).boxed()
            }
        }
    }

    fn restart(&mut self, reason: &'static str) {
        debug!(reason, "re-evaluating subscription");
        self.current = self.evaluate();
        self.current_done = false;
    }

    async fn next(&mut self) -> Option<AuthorizationDecision> {
        loop {
            tokio::select! {
                biased;
                changed = self.config.changed(), if self.config_open => match changed {
                    Ok(()) => self.restart("configuration changed"),
                    Err(_) => self.config_open = false,
                },
                changed = self.generation.changed(), if self.generation_open => match changed {
                    Ok(()) => self.restart("index publication changed"),
                    Err(_) => self.generation_open = false,
                },
                decision = self.current.next(), if !self.current_done => match decision {
                    Some(decision) if self.last.as_ref() == Some(&decision) => {}
                    Some(decision) => {
                        self.shared.observer.on_decision(&self.subscription, &decision);
                        self.last = Some(decision.clone());
                        return Some(decision);
                    }
                    None => self.current_done = true,
                },
                else => return None,
            }
        }
    }
}
