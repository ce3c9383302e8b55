//! Direction (Incoming / Outgoing) of a message on a session stream.

use serde::{Deserialize, Serialize};

/// Which way a message travelled on its session.
///
/// Outgoing messages are the ones we sent; they show up in the stream
/// again as echoes once the session has sequenced them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}

impl Direction {
    /// Compact char form (`'I'` / `'O'`), used in message ids and logs.
    pub fn as_char(self) -> char {
        match self {
            Direction::Incoming => 'I',
            Direction::Outgoing => 'O',
        }
    }

    /// Try to parse from a char (`'I'` / `'O'`, case-sensitive).
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(Direction::Incoming),
            'O' => Some(Direction::Outgoing),
            _ => None,
        }
    }
}
