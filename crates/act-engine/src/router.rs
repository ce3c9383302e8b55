//! Message stream ingest and subscription registry.
//!
//! The ingest collaborator calls [`MessageRouter::deliver`] once per
//! parsed inbound (or echoed outbound) message, in arrival order. The
//! router fans every message out to all currently registered buffers
//! and records per-session positions for checkpoints.
//!
//! Routing policy:
//! - a message reaches a buffer only if that buffer's prefilter accepts it,
//! - a buffer unregistered before delivery never sees the message.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use act_core::{Direction, Message, SessionPosition, SharedPredicate};
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::buffer::{Append, SubscriptionBuffer, SubscriptionId};

#[derive(Debug, Default)]
pub struct MessageRouter {
    subscriptions: DashMap<SubscriptionId, Arc<SubscriptionBuffer>>,
    positions: DashMap<String, SessionPosition>,
    next_subscription: AtomicU64,
    delivered: AtomicU64,
}

impl MessageRouter {
    pub fn new() -> Self {
        MessageRouter::default()
    }

    /// Fan one stream message out to every registered buffer.
    pub fn deliver(&self, message: Message) {
        let message = Arc::new(message);
        self.record_position(&message);
        self.delivered.fetch_add(1, Ordering::Relaxed);

        // Snapshot of current subscriptions so no shard lock is held
        // while appending.
        let targets: Vec<Arc<SubscriptionBuffer>> = self
            .subscriptions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for buffer in targets {
            match buffer.offer(&message) {
                Append::Accepted => {
                    trace!(subscription = buffer.id().0, id = %message.id, "buffered");
                }
                Append::Duplicate => {
                    warn!(subscription = buffer.id().0, id = %message.id, "duplicate delivery ignored");
                }
                Append::Filtered | Append::Closed => {}
            }
        }
    }

    /// Register a new buffer. It sees every message delivered from now
    /// until the returned guard is released or dropped.
    pub fn subscribe(self: &Arc<Self>, prefilter: SharedPredicate) -> Subscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        let buffer = Arc::new(SubscriptionBuffer::new(id, prefilter));
        self.subscriptions.insert(id, Arc::clone(&buffer));
        debug!(subscription = id.0, "subscription registered");

        Subscription {
            router: Arc::clone(self),
            buffer,
            released: false,
        }
    }

    fn unregister(&self, id: SubscriptionId) {
        if let Some((_, buffer)) = self.subscriptions.remove(&id) {
            let held = buffer.close();
            debug!(subscription = id.0, held, "subscription released");
        }
    }

    /// Last observed sequences, per session.
    pub fn positions(&self) -> BTreeMap<String, SessionPosition> {
        self.positions
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Total messages delivered since start.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn record_position(&self, message: &Message) {
        let mut position = self
            .positions
            .entry(message.session_alias().to_string())
            .or_default();

        let slot = match message.direction() {
            Direction::Incoming => &mut position.incoming,
            Direction::Outgoing => &mut position.outgoing,
        };
        *slot = Some(slot.map_or(message.sequence(), |seq| seq.max(message.sequence())));
    }
}

/// Registration guard for one buffer.
///
/// Dropping it unregisters the buffer, so teardown happens on every
/// exit path of the owner.
#[derive(Debug)]
pub struct Subscription {
    router: Arc<MessageRouter>,
    buffer: Arc<SubscriptionBuffer>,
    released: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.buffer.id()
    }

    pub fn buffer(&self) -> &SubscriptionBuffer {
        &self.buffer
    }

    /// Shared handle to the buffer, e.g. for inspection after release.
    pub fn buffer_handle(&self) -> Arc<SubscriptionBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unregister now. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.router.unregister(self.buffer.id());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
