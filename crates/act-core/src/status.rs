//! Classifications attached to filters and the statuses a call resolves to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a matching message means for the call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Success,
    /// Business-level failure (reject, negative status report, ...).
    Error,
}

/// Outcome of a retrieval.
///
/// `Timeout` and `Cancelled` are ordinary values, not errors: callers
/// decide whether either is an application-level failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl RequestStatus {
    pub fn is_success(self) -> bool {
        self == RequestStatus::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Success => "SUCCESS",
            RequestStatus::Error => "ERROR",
            RequestStatus::Timeout => "TIMEOUT",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }
}

impl From<Classification> for RequestStatus {
    fn from(value: Classification) -> Self {
        match value {
            Classification::Success => RequestStatus::Success,
            Classification::Error => RequestStatus::Error,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
