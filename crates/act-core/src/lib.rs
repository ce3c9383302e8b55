//! act-core
//!
//! Pure data model for request/response correlation:
//! - messages (opaque structured protocol messages)
//! - ordered filters and their classifications
//! - call statuses, checkpoints and results
//! - errors

pub mod direction;
pub mod message;
pub mod filter;
pub mod status;
pub mod checkpoint;
pub mod result;
pub mod error;

pub use direction::Direction;

pub use message::{FieldValue, Fields, Message, MessageId};

pub use filter::{
    AcceptAll,
    ExcludeHeartbeats,
    Filter,
    FilterSet,
    Predicate,
    SharedPredicate,
    HEARTBEAT,
};

pub use status::{Classification, RequestStatus};
pub use checkpoint::{Checkpoint, SessionPosition};
pub use result::{AggregateResult, MatchResult};
pub use error::{ActError, ActResult};
