//! Call orchestrator.
//!
//! A [`RequestProcessor`] is the scope of one external call. It owns
//! the call's subscription buffer and walks this state machine:
//!
//! ```text
//! Idle -> Sent -> AwaitingMatch -> Resolved | TimedOut | Cancelled -> Closed
//! ```
//!
//! - Opening registers the buffer (incoming messages passing the scope
//!   prefilter) and takes the checkpoint.
//! - Retrievals take `&mut self`: one outstanding retrieval per scope.
//! - Dropping the processor unregisters the buffer on every exit path
//!   (normal return, `?`, panic unwinding).
//! - A failed send closes the scope; any further use returns
//!   [`ActError::ScopeClosed`].

use std::sync::Arc;
use std::time::Duration;

use act_core::{
    ActError, ActResult, AggregateResult, Checkpoint, Direction, FilterSet, MatchResult, Message,
    RequestStatus, SharedPredicate,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::buffer::SubscriptionBuffer;
use crate::checkpoint::CheckpointManager;
use crate::config::EngineConfig;
use crate::echo::PendingEcho;
use crate::router::{MessageRouter, Subscription};
use crate::strategy::{self, Collected};
use crate::timeout::Deadline;
use crate::transport::Transport;

/// Who is calling, for logs and audit.
#[derive(Debug, Clone, Default)]
pub struct CallAttributes {
    pub act_name: String,
    pub parent_event_id: Option<String>,
    pub description: Option<String>,
}

impl CallAttributes {
    pub fn new(act_name: impl Into<String>) -> Self {
        CallAttributes {
            act_name: act_name.into(),
            ..CallAttributes::default()
        }
    }

    pub fn with_parent_event_id(mut self, parent_event_id: Option<String>) -> Self {
        self.parent_event_id = parent_event_id;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Sent,
    AwaitingMatch,
    Resolved,
    TimedOut,
    Cancelled,
    Closed,
}

/// Everything a scope borrows from its engine.
pub(crate) struct ScopeContext<'a> {
    pub router: &'a Arc<MessageRouter>,
    pub transport: &'a Arc<dyn Transport>,
    pub config: &'a EngineConfig,
    pub checkpoints: &'a CheckpointManager,
}

pub struct RequestProcessor {
    attrs: CallAttributes,
    session: String,
    subscription: Subscription,
    checkpoint: Checkpoint,
    router: Arc<MessageRouter>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    cancel: CancellationToken,
    state: CallState,
    span: Span,
}

impl RequestProcessor {
    pub(crate) fn open(
        ctx: ScopeContext<'_>,
        attrs: CallAttributes,
        session: String,
        prefilter: SharedPredicate,
        cancel: CancellationToken,
    ) -> Self {
        // Scope buffers hold counterparty traffic only; our own echoes
        // are observed through `PendingEcho`.
        let scoped: SharedPredicate = Arc::new(move |m: &Message| {
            m.direction() == Direction::Incoming && prefilter.matches(m)
        });

        // Register before the checkpoint: everything after the
        // checkpoint is guaranteed to reach the buffer.
        let subscription = ctx.router.subscribe(scoped);
        let checkpoint = ctx.checkpoints.take(ctx.router);

        let span = info_span!(
            "act_call",
            act = %attrs.act_name,
            session = %session,
            checkpoint = %checkpoint.id(),
        );
        span.in_scope(|| {
            info!(
                parent_event_id = ?attrs.parent_event_id,
                description = ?attrs.description,
                subscription = subscription.id().0,
                "scope opened"
            );
        });

        RequestProcessor {
            attrs,
            session,
            subscription,
            checkpoint,
            router: Arc::clone(ctx.router),
            transport: Arc::clone(ctx.transport),
            config: ctx.config.clone(),
            cancel,
            state: CallState::Idle,
            span,
        }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn session_alias(&self) -> &str {
        &self.session
    }

    pub fn attributes(&self) -> &CallAttributes {
        &self.attrs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that aborts this call's waits when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle to this scope's buffer. Stays readable after the scope is
    /// gone, but holds nothing and accepts nothing once released.
    pub fn buffer(&self) -> Arc<SubscriptionBuffer> {
        self.subscription.buffer_handle()
    }

    /// Transmit without waiting for anything.
    pub async fn send(&mut self, message: Message) -> ActResult<()> {
        self.ensure_can_send()?;
        let message = self.stamp(message);

        let span = self.span.clone();
        self.transmit(message).instrument(span).await?;
        self.state = CallState::Sent;
        Ok(())
    }

    /// Transmit and wait for the message's own echo, correlated on
    /// `echo_key_field`. The echo carries the stream-assigned sequence.
    ///
    /// No echo within the configured echo timeout is fatal: the scope
    /// closes and the error is returned.
    pub async fn send_with_echo(
        &mut self,
        message: Message,
        echo_key_field: &str,
    ) -> ActResult<Message> {
        self.ensure_can_send()?;
        let message = self.stamp(message);
        let deadline = Deadline::after(self.config.echo_timeout(), self.config.max_wait())?;

        let pending = match PendingEcho::arm(&self.router, &message, echo_key_field) {
            Ok(pending) => pending,
            Err(err) => return Err(self.fail(err)),
        };

        let span = self.span.clone();
        self.transmit(message).instrument(span.clone()).await?;

        let cancel = self.cancel.clone();
        let waited = pending
            .wait(deadline, &cancel, &self.attrs.act_name)
            .instrument(span)
            .await;

        match waited {
            Ok(echo) => {
                self.state = CallState::Sent;
                Ok(echo)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Resolve to the first message any filter accepts; declaration
    /// order breaks ties. Timeout/cancellation resolve without a message.
    pub async fn receive_first_matching(
        &mut self,
        filters: &FilterSet,
        timeout: Duration,
    ) -> ActResult<MatchResult> {
        let deadline = self.begin_wait(timeout)?;

        let found = strategy::first_matching(self.subscription.buffer(), filters, deadline, &self.cancel)
            .instrument(self.span.clone())
            .await;
        self.settle(found.status);

        let checkpoint = self.checkpoint.clone();
        Ok(match found.message {
            Some(message) => {
                MatchResult::matched(checkpoint, found.status, Arc::unwrap_or_clone(message))
            }
            None => MatchResult::unmatched(checkpoint, found.status),
        })
    }

    /// Collect success-classified messages over a quiescence window.
    pub async fn receive_all_matching(
        &mut self,
        filters: &FilterSet,
        wait_window: Duration,
    ) -> ActResult<AggregateResult> {
        let window = self.begin_wait(wait_window)?;

        let collected = strategy::all_matching(self.subscription.buffer(), filters, window, &self.cancel)
            .instrument(self.span.clone())
            .await;
        Ok(self.aggregate(collected))
    }

    /// Collect everything up to and including the terminal message.
    pub async fn receive_all_before_matching(
        &mut self,
        filters: &FilterSet,
        timeout: Duration,
    ) -> ActResult<AggregateResult> {
        let deadline = self.begin_wait(timeout)?;

        let collected =
            strategy::all_before_matching(self.subscription.buffer(), filters, deadline, &self.cancel)
                .instrument(self.span.clone())
                .await;
        Ok(self.aggregate(collected))
    }

    /// End the scope now. Equivalent to dropping it.
    pub fn close(self) {}

    fn ensure_open(&self) -> ActResult<()> {
        if self.state == CallState::Closed {
            self.span.in_scope(|| error!("operation on a closed request scope"));
            return Err(ActError::ScopeClosed {
                act: self.attrs.act_name.clone(),
            });
        }
        Ok(())
    }

    fn ensure_can_send(&self) -> ActResult<()> {
        self.ensure_open()?;
        if self.cancel.is_cancelled() {
            return Err(ActError::Cancelled {
                act: self.attrs.act_name.clone(),
            });
        }
        Ok(())
    }

    fn begin_wait(&mut self, budget: Duration) -> ActResult<Deadline> {
        self.ensure_open()?;
        let deadline = Deadline::after(budget, self.config.max_wait())?;
        self.state = CallState::AwaitingMatch;
        Ok(deadline)
    }

    /// Address the message to this scope's session as an outgoing message.
    fn stamp(&self, mut message: Message) -> Message {
        message.id.session_alias = self.session.clone();
        message.id.direction = Direction::Outgoing;
        if message.parent_event_id.is_none() {
            message.parent_event_id = self.attrs.parent_event_id.clone();
        }
        message
    }

    /// Hand the message to the transport. The send is bounded by the
    /// configured send timeout and aborted by cancellation; either way
    /// the scope closes.
    async fn transmit(&mut self, message: Message) -> ActResult<()> {
        let message_type = message.message_type.clone();
        let budget = self.config.send_timeout();

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            sent = tokio::time::timeout(budget, self.transport.send(message)) => Some(sent),
        };

        let reason = match sent {
            Some(Ok(Ok(()))) => {
                debug!(%message_type, "message sent");
                return Ok(());
            }
            Some(Ok(Err(err))) => err.to_string(),
            Some(Err(_)) => format!("transport did not accept the message within {budget:?}"),
            None => {
                info!(%message_type, "call cancelled during send; releasing scope");
                self.teardown();
                return Err(ActError::Cancelled {
                    act: self.attrs.act_name.clone(),
                });
            }
        };

        let session = self.session.clone();
        Err(self.fail(ActError::SendFailed {
            session,
            message_type,
            reason,
        }))
    }

    fn settle(&mut self, status: RequestStatus) {
        self.state = match status {
            RequestStatus::Success | RequestStatus::Error => CallState::Resolved,
            RequestStatus::Timeout => {
                self.span.in_scope(|| warn!("no matching reply before deadline"));
                CallState::TimedOut
            }
            RequestStatus::Cancelled => {
                self.span.in_scope(|| info!("call cancelled; releasing scope"));
                self.subscription.release();
                CallState::Cancelled
            }
        };
    }

    fn aggregate(&mut self, collected: Collected) -> AggregateResult {
        self.settle(collected.status);
        let messages = collected
            .messages
            .into_iter()
            .map(Arc::unwrap_or_clone)
            .collect();
        AggregateResult::new(self.checkpoint.clone(), collected.status, messages)
    }

    fn fail(&mut self, err: ActError) -> ActError {
        self.span.in_scope(|| error!(error = %err, "call failed; closing scope"));
        self.teardown();
        err
    }

    fn teardown(&mut self) {
        if self.state != CallState::Closed {
            self.subscription.release();
            self.state = CallState::Closed;
        }
    }
}

impl Drop for RequestProcessor {
    fn drop(&mut self) {
        let final_state = self.state;
        self.teardown();
        self.span
            .in_scope(|| debug!(?final_state, "scope closed"));
    }
}

impl std::fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("act", &self.attrs.act_name)
            .field("session", &self.session)
            .field("checkpoint", &self.checkpoint.id())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
