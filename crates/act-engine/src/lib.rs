//! act-engine
//!
//! Request/response correlation for remote acts:
//! - router: stream ingest fanned out to per-call subscriptions
//! - buffer: ordered, de-duplicated per-call message store
//! - strategy: first-matching / all-matching / all-before-matching
//! - echo: correlation of a send with its own stream echo
//! - timeout: bounded waits on a monotonic clock
//! - processor: the per-call scope tying it all together

pub mod config;
pub mod buffer;
pub mod router;
pub mod timeout;
pub mod strategy;
pub mod echo;
pub mod checkpoint;
pub mod transport;
pub mod processor;
pub mod engine;

pub use config::EngineConfig;
pub use buffer::{Append, SubscriptionBuffer, SubscriptionId};
pub use router::{MessageRouter, Subscription};
pub use timeout::{Deadline, Wakeup};
pub use echo::PendingEcho;
pub use checkpoint::CheckpointManager;
pub use transport::{Transport, TransportError};
pub use processor::{CallAttributes, CallState, RequestProcessor};
pub use engine::{ActEngine, ScopeBuilder};

// Filters and results are part of every handler's vocabulary.
pub use act_core;
pub use tokio_util::sync::CancellationToken;
