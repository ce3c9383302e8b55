//! Protocol-level messages as observed on a session stream.
//!
//! These are **opaque** structured messages:
//! - [`Message`]: type tag, stream identity and a field mapping.
//! - [`FieldValue`]: a simple value, a nested component or a repeating group.
//!
//! Nothing in this crate understands FIX (or any other dictionary);
//! callers look fields up by name and compare them in their own
//! predicates. A message is immutable once the stream has observed it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// Ordered field mapping. Keys are unique; insertion order is kept.
pub type Fields = IndexMap<String, FieldValue>;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar value, kept in its textual wire form.
    Simple(String),

    /// Nested component (e.g. `TradingParty`).
    Message(Fields),

    /// Repeating group (e.g. `NoRelatedSym`).
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            FieldValue::Message(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Simple(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Simple(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Simple(value.to_string())
    }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self {
        FieldValue::Message(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        FieldValue::List(value)
    }
}

/// Position of a message in the stream.
///
/// `sequence` is assigned by the session and increases monotonically
/// per `(session_alias, direction)`. `0` means "not yet sequenced"
/// (an outbound message that has not been sent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub session_alias: String,
    pub direction: Direction,
    pub sequence: u64,
}

impl MessageId {
    pub fn new(session_alias: impl Into<String>, direction: Direction, sequence: u64) -> Self {
        MessageId {
            session_alias: session_alias.into(),
            direction,
            sequence,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.session_alias,
            self.direction.as_char(),
            self.sequence
        )
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stream identity. Inbound wire payloads usually omit it; the
    /// session stamps it on arrival.
    #[serde(default)]
    pub id: MessageId,

    /// Type tag, e.g. `"ExecutionReport"`.
    pub message_type: String,

    /// Event the message is reported under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,

    #[serde(default)]
    pub fields: Fields,
}

impl Message {
    /// New, unsequenced outgoing message for `session_alias`.
    pub fn new(session_alias: impl Into<String>, message_type: impl Into<String>) -> Self {
        Message {
            id: MessageId::new(session_alias, Direction::Outgoing, 0),
            message_type: message_type.into(),
            parent_event_id: None,
            fields: Fields::new(),
        }
    }

    /// Builder: set a field (replacing any previous value for `key`).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder: set the stream identity.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn session_alias(&self) -> &str {
        &self.id.session_alias
    }

    pub fn direction(&self) -> Direction {
        self.id.direction
    }

    pub fn sequence(&self) -> u64 {
        self.id.sequence
    }

    pub fn is_type(&self, message_type: &str) -> bool {
        self.message_type == message_type
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Scalar field as text. `None` when absent or not a scalar.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_str)
    }

    /// Scalar field parsed as an unsigned integer.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_str(key).and_then(|s| s.trim().parse().ok())
    }

    /// `true` only when `key` is present, scalar, and equal to `expected`.
    ///
    /// A missing field never matches; predicates built on this never
    /// have to special-case absent keys.
    pub fn field_eq(&self, key: &str, expected: &str) -> bool {
        self.get_str(key) == Some(expected)
    }

    /// `true` when both messages carry the same scalar value for `key`.
    pub fn same_field(&self, other: &Message, key: &str) -> bool {
        match (self.get_str(key), other.get_str(key)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Resolve a dotted path through components and groups.
    ///
    /// Numeric segments index into repeating groups:
    /// `"NoQuoteQualifiers.0.QuoteQualifier"`.
    pub fn get_path(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let mut current = self.field(segments.next()?)?;

        for segment in segments {
            current = match current {
                FieldValue::Message(fields) => fields.get(segment)?,
                FieldValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                FieldValue::Simple(_) => return None,
            };
        }

        Some(current)
    }

    pub fn get_path_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(FieldValue::as_str)
    }
}
