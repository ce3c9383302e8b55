// crates/act-server/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use act_core::{Direction, FieldValue, Fields, Message, MessageId};
use act_engine::{ActEngine, EngineConfig, MessageRouter, Transport, TransportError};
use act_server::handlers::ActHandler;
use act_server::types::PlaceMessageRequest;
use async_trait::async_trait;

pub const SESSION: &str = "fix-client";

/// Given an outbound message and its sequence, the replies to stream back.
pub type Script = Box<dyn Fn(&Message, u64) -> Vec<Message> + Send + Sync>;

/// In-process counterparty: echoes every send, then streams scripted
/// replies a few milliseconds apart.
pub struct ScriptedCounterparty {
    router: Arc<MessageRouter>,
    script: Script,
    next_outgoing: AtomicU64,
    next_incoming: Arc<AtomicU64>,
    sent: Mutex<Vec<Message>>,
}

impl ScriptedCounterparty {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedCounterparty {
    async fn send(&self, mut message: Message) -> Result<(), TransportError> {
        let seq = self.next_outgoing.fetch_add(1, Ordering::SeqCst);
        message.id = MessageId::new(SESSION, Direction::Outgoing, seq);
        self.sent.lock().unwrap().push(message.clone());

        let replies = (self.script)(&message, seq);
        self.router.deliver(message);

        let router = Arc::clone(&self.router);
        let next_incoming = Arc::clone(&self.next_incoming);
        tokio::spawn(async move {
            for mut reply in replies {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let seq = next_incoming.fetch_add(1, Ordering::SeqCst);
                reply.id = MessageId::new(SESSION, Direction::Incoming, seq);
                router.deliver(reply);
            }
        });
        Ok(())
    }
}

pub struct Harness {
    pub router: Arc<MessageRouter>,
    pub counterparty: Arc<ScriptedCounterparty>,
    pub handler: Arc<ActHandler>,
}

pub fn harness(script: impl Fn(&Message, u64) -> Vec<Message> + Send + Sync + 'static) -> Harness {
    let router = Arc::new(MessageRouter::new());
    let counterparty = Arc::new(ScriptedCounterparty {
        router: Arc::clone(&router),
        script: Box::new(script),
        next_outgoing: AtomicU64::new(100),
        next_incoming: Arc::new(AtomicU64::new(1)),
        sent: Mutex::new(Vec::new()),
    });
    let engine = Arc::new(ActEngine::new(
        Arc::clone(&router),
        counterparty.clone(),
        EngineConfig::default(),
    ));

    Harness {
        router,
        counterparty,
        handler: Arc::new(ActHandler::new(engine, SESSION)),
    }
}

/// A counterparty that never answers.
pub fn silent(_: &Message, _: u64) -> Vec<Message> {
    Vec::new()
}

pub fn msg(message_type: &str, fields: &[(&str, &str)]) -> Message {
    fields.iter().fold(Message::new(SESSION, message_type), |m, (k, v)| {
        m.with_field(*k, *v)
    })
}

pub fn request(message: Message) -> PlaceMessageRequest {
    PlaceMessageRequest {
        message,
        parent_event_id: Some("evt-1".to_string()),
        description: None,
    }
}

/// Repeating group of single-field entries, e.g. `NoRelatedSym`.
pub fn group(key: &str, values: &[&str]) -> FieldValue {
    FieldValue::from(
        values
            .iter()
            .map(|v| {
                let mut entry = Fields::new();
                entry.insert(key.to_string(), FieldValue::from(*v));
                FieldValue::from(entry)
            })
            .collect::<Vec<_>>(),
    )
}
