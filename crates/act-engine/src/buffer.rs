//! Per-call subscription buffer.
//!
//! Holds, in arrival order, every stream message that passed the
//! owning scope's prefilter. The ingest path is the only writer;
//! waiting retrievals scan it concurrently.
//!
//! Invariants:
//! - only prefilter-accepted messages are stored,
//! - each [`MessageId`] is stored at most once,
//! - once closed, nothing more is appended and the storage is released.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use act_core::{Message, MessageId, SharedPredicate};
use tokio::sync::watch;

/// Identifier of a registered buffer, unique per router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// What happened to a message offered to a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Append {
    Accepted,
    /// Rejected by the prefilter.
    Filtered,
    /// Same id already stored.
    Duplicate,
    /// Buffer was closed; message dropped for this scope.
    Closed,
}

#[derive(Debug, Default)]
struct BufferState {
    messages: Vec<Arc<Message>>,
    seen: HashSet<MessageId>,
    closed: bool,
}

pub struct SubscriptionBuffer {
    id: SubscriptionId,
    prefilter: SharedPredicate,
    state: Mutex<BufferState>,
    /// Current length; bumped on every append so waiters wake up.
    len_tx: watch::Sender<usize>,
}

impl SubscriptionBuffer {
    pub(crate) fn new(id: SubscriptionId, prefilter: SharedPredicate) -> Self {
        let (len_tx, _) = watch::channel(0);
        SubscriptionBuffer {
            id,
            prefilter,
            state: Mutex::new(BufferState::default()),
            len_tx,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Offer a stream message. Called from the ingest path only.
    pub(crate) fn offer(&self, message: &Arc<Message>) -> Append {
        if !self.prefilter.matches(message) {
            return Append::Filtered;
        }

        let mut state = self.lock();
        if state.closed {
            return Append::Closed;
        }
        if !state.seen.insert(message.id.clone()) {
            return Append::Duplicate;
        }

        state.messages.push(Arc::clone(message));
        self.len_tx.send_replace(state.messages.len());
        Append::Accepted
    }

    /// Receiver that observes every append (and the final close).
    pub fn watch(&self) -> watch::Receiver<usize> {
        self.len_tx.subscribe()
    }

    /// Messages stored at positions `cursor..`.
    pub fn messages_from(&self, cursor: usize) -> Vec<Arc<Message>> {
        let state = self.lock();
        state
            .messages
            .get(cursor..)
            .map(<[Arc<Message>]>::to_vec)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Arc<Message>> {
        self.messages_from(0)
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Stop accumulating and release storage. Idempotent.
    ///
    /// Returns how many messages were held at close.
    pub(crate) fn close(&self) -> usize {
        let mut state = self.lock();
        if state.closed {
            return 0;
        }
        state.closed = true;
        let held = state.messages.len();
        state.messages = Vec::new();
        state.seen = HashSet::new();
        self.len_tx.send_replace(0);
        held
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panic while holding the lock cannot leave the Vec torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubscriptionBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBuffer")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
