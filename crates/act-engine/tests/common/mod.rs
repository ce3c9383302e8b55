// crates/act-engine/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use act_core::{Direction, Message, MessageId};
use act_engine::{ActEngine, EngineConfig, MessageRouter, Transport, TransportError};
use async_trait::async_trait;

pub const SESSION: &str = "fix-client";

/// In-process session: sequences each send and, unless told not to,
/// echoes it back into the router the way a real session does.
pub struct LoopbackTransport {
    router: Arc<MessageRouter>,
    next_seq: AtomicU64,
    echo: AtomicBool,
    reject: AtomicBool,
    sent: Mutex<Vec<Message>>,
}

impl LoopbackTransport {
    pub fn new(router: Arc<MessageRouter>, first_seq: u64) -> Self {
        LoopbackTransport {
            router,
            next_seq: AtomicU64::new(first_seq),
            echo: AtomicBool::new(true),
            reject: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn disable_echo(&self) {
        self.echo.store(false, Ordering::SeqCst);
    }

    pub fn reject_sends(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, mut message: Message) -> Result<(), TransportError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("session is logged out".to_string()));
        }

        message.id.sequence = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.clone());

        if self.echo.load(Ordering::SeqCst) {
            self.router.deliver(message);
        }
        Ok(())
    }
}

/// Session whose writes never complete, like a peer that stopped reading.
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _message: Message) -> Result<(), TransportError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub struct Harness {
    pub router: Arc<MessageRouter>,
    pub transport: Arc<LoopbackTransport>,
    pub engine: ActEngine,
}

pub fn harness(first_seq: u64) -> Harness {
    let router = Arc::new(MessageRouter::new());
    let transport = Arc::new(LoopbackTransport::new(Arc::clone(&router), first_seq));
    let config = EngineConfig {
        echo_timeout_ms: 2_000,
        ..EngineConfig::default()
    };
    let engine = ActEngine::new(Arc::clone(&router), transport.clone(), config);

    Harness {
        router,
        transport,
        engine,
    }
}

/// Engine over a session whose writes never complete.
pub fn stalled_engine() -> (Arc<MessageRouter>, ActEngine) {
    let router = Arc::new(MessageRouter::new());
    let engine = ActEngine::new(Arc::clone(&router), Arc::new(StalledTransport), EngineConfig::default());
    (router, engine)
}

static NEXT_INCOMING: AtomicU64 = AtomicU64::new(1);

/// Counterparty message with a fresh incoming sequence.
pub fn incoming(message_type: &str, fields: &[(&str, &str)]) -> Message {
    let seq = NEXT_INCOMING.fetch_add(1, Ordering::SeqCst);
    fields.iter().fold(
        Message::new(SESSION, message_type)
            .with_id(MessageId::new(SESSION, Direction::Incoming, seq)),
        |msg, (k, v)| msg.with_field(*k, *v),
    )
}

/// Deliver `messages` from a separate task, `gap` apart.
pub fn deliver_later(router: &Arc<MessageRouter>, gap: Duration, messages: Vec<Message>) {
    let router = Arc::clone(router);
    tokio::spawn(async move {
        for message in messages {
            tokio::time::sleep(gap).await;
            router.deliver(message);
        }
    });
}
