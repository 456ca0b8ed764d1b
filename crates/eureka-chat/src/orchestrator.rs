//! Chat orchestrator: one load/route/handle/save cycle per turn.
//!
//! Wires the session store, the task router and the task handlers together.
//! Turns for the same session token are serialized; turns for different
//! tokens run in parallel.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eureka_core::config::SessionConfig;
use eureka_core::types::{SessionToken, TaskKind, Timestamp, TurnMetadata, TurnResponse};
use eureka_core::EurekaConfig;
use eureka_knowledge::KnowledgeLookup;
use eureka_session::{SessionLocks, SessionStore};
use tracing::{debug, info, warn};

use crate::completion::CompletionService;
use crate::enrichment::EnrichmentPipeline;
use crate::error::ChatError;
use crate::handler::{GenericHandler, IncidentHandler, TaskHandler, TurnInput};
use crate::router::TaskRouter;

/// Central coordinator for conversational turns.
pub struct ChatOrchestrator {
    store: Arc<dyn SessionStore>,
    locks: Arc<SessionLocks>,
    router: TaskRouter,
    generic: GenericHandler,
    incident: IncidentHandler,
    session: SessionConfig,
    ttl: chrono::Duration,
    requests: AtomicU64,
}

impl ChatOrchestrator {
    /// Build the orchestrator and every component it owns.
    ///
    /// Fails only on invalid router configuration.
    pub fn new(
        config: &EurekaConfig,
        store: Arc<dyn SessionStore>,
        knowledge: Arc<dyn KnowledgeLookup>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self, ChatError> {
        let timeout = Duration::from_secs(config.completion.timeout_secs);
        let history_limit = config.session.history_limit;

        let router = TaskRouter::new(&config.router, Arc::clone(&completion), timeout)?;
        let pipeline = EnrichmentPipeline::new(knowledge, router.extractor().clone());
        let generic = GenericHandler::new(Arc::clone(&completion), timeout, history_limit);
        let incident = IncidentHandler::new(pipeline, completion, timeout, history_limit);

        Ok(Self {
            store,
            locks: Arc::new(SessionLocks::new()),
            router,
            generic,
            incident,
            session: config.session.clone(),
            ttl: chrono::Duration::minutes(i64::from(config.session.ttl_minutes)),
            requests: AtomicU64::new(0),
        })
    }

    /// Handle one user turn.
    ///
    /// A blank token is replaced by a generated one, returned in the
    /// response. The only error is an unavailable session store.
    pub async fn handle_turn(
        &self,
        token: &SessionToken,
        utterance: &str,
    ) -> Result<TurnResponse, ChatError> {
        let token = if token.is_blank() {
            let generated = SessionToken::generate();
            debug!(token = %generated, "Generated session token");
            generated
        } else {
            token.clone()
        };
        let utterance = self.clamp_utterance(&token, utterance);

        let (text, metadata) = {
            let _guard = self.locks.acquire(&token).await?;
            let mut context = self.store.load(&token).await?;
            context.touch(Timestamp::now());

            let decision = self.router.route(&utterance, &mut context).await;
            let handler = self.handler_for(decision.task);
            debug!(
                token = %token,
                task = %decision.task,
                exit_requested = decision.exit_requested,
                "Dispatching turn"
            );

            let turn = TurnInput {
                utterance: &utterance,
                exit_requested: decision.exit_requested,
            };
            let text = handler.handle(&turn, &mut context).await;
            let metadata = TurnMetadata::from_context(&context, handler.task());

            self.store.save(&token, context).await?;
            (text, metadata)
        };

        self.maybe_evict();

        Ok(TurnResponse {
            session_token: token,
            text,
            metadata,
        })
    }

    /// Evict expired sessions immediately.
    ///
    /// Returns the number of sessions removed.
    pub async fn evict_now(&self) -> Result<usize, ChatError> {
        let removed = self.store.evict_expired(Timestamp::now(), self.ttl).await?;
        let pruned = self.locks.prune();
        info!(removed, pruned, "Session eviction complete");
        Ok(removed)
    }

    /// Number of turns handled since start.
    pub fn requests_handled(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn handler_for(&self, task: TaskKind) -> &dyn TaskHandler {
        match task {
            TaskKind::Generic => &self.generic,
            TaskKind::IncidentAnalysis => &self.incident,
        }
    }

    fn clamp_utterance<'a>(&self, token: &SessionToken, utterance: &'a str) -> Cow<'a, str> {
        let max = self.session.max_utterance_chars;
        if max == 0 || utterance.chars().count() <= max {
            return Cow::Borrowed(utterance);
        }
        warn!(token = %token, max_chars = max, "Utterance truncated");
        Cow::Owned(utterance.chars().take(max).collect())
    }

    /// Every Nth request, evict in the background without holding any
    /// per-token lock.
    fn maybe_evict(&self) {
        let handled = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = self.session.eviction_interval_requests;
        if interval == 0 || handled % interval != 0 {
            return;
        }

        let store = Arc::clone(&self.store);
        let locks = Arc::clone(&self.locks);
        let ttl = self.ttl;
        tokio::spawn(async move {
            match store.evict_expired(Timestamp::now(), ttl).await {
                Ok(removed) => {
                    let pruned = locks.prune();
                    debug!(removed, pruned, "Opportunistic session eviction");
                }
                Err(e) => warn!(error = %e, "Session eviction failed"),
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
