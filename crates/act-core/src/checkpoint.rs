//! Opaque stream-position tokens taken when a call begins.
//!
//! A checkpoint is handed back to the caller for audit/replay. The
//! engine attaches no behavior to it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last sequence observed per direction on one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPosition {
    pub incoming: Option<u64>,
    pub outgoing: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    id: String,
    taken_at: DateTime<Utc>,
    positions: BTreeMap<String, SessionPosition>,
}

impl Checkpoint {
    pub fn new(
        id: impl Into<String>,
        taken_at: DateTime<Utc>,
        positions: BTreeMap<String, SessionPosition>,
    ) -> Self {
        Checkpoint {
            id: id.into(),
            taken_at,
            positions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn position(&self, session_alias: &str) -> Option<SessionPosition> {
        self.positions.get(session_alias).copied()
    }

    pub fn positions(&self) -> &BTreeMap<String, SessionPosition> {
        &self.positions
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
