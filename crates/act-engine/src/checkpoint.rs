//! Checkpoint capture.

use std::sync::atomic::{AtomicU64, Ordering};

use act_core::Checkpoint;
use chrono::Utc;

use crate::router::MessageRouter;

/// Hands out checkpoints with process-unique ids.
#[derive(Debug, Default)]
pub struct CheckpointManager {
    next: AtomicU64,
}

impl CheckpointManager {
    pub fn new() -> Self {
        CheckpointManager::default()
    }

    /// Capture the router's current per-session positions.
    pub fn take(&self, router: &MessageRouter) -> Checkpoint {
        let seq = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let taken_at = Utc::now();
        let id = format!("cp-{}-{:06}", taken_at.timestamp_millis(), seq);
        Checkpoint::new(id, taken_at, router.positions())
    }
}
