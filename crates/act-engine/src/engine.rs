//! Engine facade handed to every act handler.

use std::sync::Arc;

use act_core::{ExcludeHeartbeats, Predicate, SharedPredicate};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointManager;
use crate::config::EngineConfig;
use crate::processor::{CallAttributes, RequestProcessor, ScopeContext};
use crate::router::MessageRouter;
use crate::transport::Transport;

/// Shared entry point: one per process, many scopes in parallel.
pub struct ActEngine {
    router: Arc<MessageRouter>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    checkpoints: CheckpointManager,
}

impl ActEngine {
    pub fn new(
        router: Arc<MessageRouter>,
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Self {
        ActEngine {
            router,
            transport,
            config,
            checkpoints: CheckpointManager::new(),
        }
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start describing a scope on `session`.
    pub fn scope(&self, attrs: CallAttributes, session: impl Into<String>) -> ScopeBuilder<'_> {
        ScopeBuilder {
            engine: self,
            attrs,
            session: session.into(),
            prefilter: None,
            cancel: None,
        }
    }

    /// Open a scope with the default prefilter and no external cancellation.
    pub fn open(&self, attrs: CallAttributes, session: impl Into<String>) -> RequestProcessor {
        self.scope(attrs, session).open()
    }
}

impl std::fmt::Debug for ActEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActEngine")
            .field("config", &self.config)
            .field("active_subscriptions", &self.router.active_subscriptions())
            .finish_non_exhaustive()
    }
}

pub struct ScopeBuilder<'a> {
    engine: &'a ActEngine,
    attrs: CallAttributes,
    session: String,
    prefilter: Option<SharedPredicate>,
    cancel: Option<CancellationToken>,
}

impl<'a> ScopeBuilder<'a> {
    /// Replace the default heartbeat-excluding prefilter.
    pub fn prefilter(mut self, prefilter: impl Predicate + 'static) -> Self {
        self.prefilter = Some(Arc::new(prefilter));
        self
    }

    /// Abort this scope's waits when `token` is cancelled.
    pub fn cancel_on(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.child_token());
        self
    }

    pub fn open(self) -> RequestProcessor {
        let engine = self.engine;
        let ctx = ScopeContext {
            router: &engine.router,
            transport: &engine.transport,
            config: &engine.config,
            checkpoints: &engine.checkpoints,
        };

        RequestProcessor::open(
            ctx,
            self.attrs,
            self.session,
            self.prefilter.unwrap_or_else(|| Arc::new(ExcludeHeartbeats)),
            self.cancel.unwrap_or_default(),
        )
    }
}
