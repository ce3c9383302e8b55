//! Shared types for the act server.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected act clients
//! - the registry of connected clients
//! - the JSON request/reply shapes spoken on the act listener

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use act_core::{AggregateResult, Checkpoint, MatchResult, Message, RequestStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Identifier for a connected client, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

/// Registry of connected clients.
///
/// - Key: `ClientId`
/// - Value: token that cancels every in-flight act of that client.
pub type ClientRegistry = Arc<RwLock<HashMap<ClientId, CancellationToken>>>;

/// Replies flowing back to one client's writer task.
pub type ReplyTx = mpsc::UnboundedSender<ActReply>;
pub type ReplyRx = mpsc::UnboundedReceiver<ActReply>;

/// Remote operations exposed by the service. Wire names follow the
/// method names callers already use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActMethod {
    #[serde(rename = "placeOrderFIX")]
    PlaceOrderFix,
    #[serde(rename = "sendMessage")]
    SendMessage,
    #[serde(rename = "placeQuoteRequestFIX")]
    PlaceQuoteRequestFix,
    #[serde(rename = "placeQuoteFIX")]
    PlaceQuoteFix,
    #[serde(rename = "placeOrderMassCancelRequestFIX")]
    PlaceOrderMassCancelRequestFix,
    #[serde(rename = "placeQuoteCancelFIX")]
    PlaceQuoteCancelFix,
    #[serde(rename = "placeQuoteResponseFIX")]
    PlaceQuoteResponseFix,
    #[serde(rename = "placeSecurityListRequest")]
    PlaceSecurityListRequest,
}

impl ActMethod {
    /// Human-readable act name used in logs and call attributes.
    pub fn act_name(self) -> &'static str {
        match self {
            ActMethod::PlaceOrderFix => "Place order FIX",
            ActMethod::SendMessage => "Send message",
            ActMethod::PlaceQuoteRequestFix => "Place quote request FIX",
            ActMethod::PlaceQuoteFix => "Place quote FIX",
            ActMethod::PlaceOrderMassCancelRequestFix => "Place order mass cancel request FIX",
            ActMethod::PlaceQuoteCancelFix => "Place quote cancel FIX",
            ActMethod::PlaceQuoteResponseFix => "Place quote response FIX",
            ActMethod::PlaceSecurityListRequest => "Place security list request",
        }
    }
}

impl fmt::Display for ActMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.act_name())
    }
}

/// Payload shared by every act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceMessageRequest {
    pub message: Message,
    #[serde(default)]
    pub parent_event_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One line read from an act client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActRequest {
    /// Echoed back in the reply so clients can pipeline requests.
    #[serde(default)]
    pub id: u64,
    pub method: ActMethod,
    pub request: PlaceMessageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceMessageResponse {
    pub response_message: Option<Message>,
    pub status: RequestStatus,
    pub checkpoint: Checkpoint,
}

impl From<MatchResult> for PlaceMessageResponse {
    fn from(result: MatchResult) -> Self {
        PlaceMessageResponse {
            response_message: result.message,
            status: result.status,
            checkpoint: result.checkpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceMessageMultipleResponse {
    pub response_messages: Vec<Message>,
    pub status: RequestStatus,
    pub checkpoint: Checkpoint,
}

impl From<AggregateResult> for PlaceMessageMultipleResponse {
    fn from(result: AggregateResult) -> Self {
        PlaceMessageMultipleResponse {
            response_messages: result.messages,
            status: result.status,
            checkpoint: result.checkpoint,
        }
    }
}

/// One page of security-list symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbols {
    pub symbol: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSecurityListResponse {
    /// Page index (0, 1, 2, ...) to symbols.
    pub security_list_dictionary: BTreeMap<usize, Symbols>,
    pub status: RequestStatus,
    pub checkpoint: Checkpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub status: RequestStatus,
    pub checkpoint: Checkpoint,
}

/// Method-specific reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActResponse {
    Place(PlaceMessageResponse),
    Multiple(PlaceMessageMultipleResponse),
    SecurityList(PlaceSecurityListResponse),
    Send(SendMessageResponse),
}

impl ActResponse {
    pub fn status(&self) -> RequestStatus {
        match self {
            ActResponse::Place(r) => r.status,
            ActResponse::Multiple(r) => r.status,
            ActResponse::SecurityList(r) => r.status,
            ActResponse::Send(r) => r.status,
        }
    }
}

/// One line written back to an act client. Exactly one of `response`
/// and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActReply {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ActResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActReply {
    pub fn ok(id: u64, response: ActResponse) -> Self {
        ActReply {
            id,
            response: Some(response),
            error: None,
        }
    }

    pub fn error(id: u64, error: impl Into<String>) -> Self {
        ActReply {
            id,
            response: None,
            error: Some(error.into()),
        }
    }
}
