//! TCP session to the downstream counterparty.
//!
//! The session plays both stream roles the engine relies on:
//! - as the `Transport`, it sequences and writes outbound messages, then
//!   feeds the sequenced copy back into the router (the echo);
//! - its reader task decodes inbound frames, sequences them and
//!   delivers them in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use act_core::{Direction, Message, MessageId};
use act_engine::{MessageRouter, Transport, TransportError};
use act_protocol::{decode_message, encode_message, FrameDecoder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct CounterpartySession {
    alias: String,
    router: Arc<MessageRouter>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    next_outgoing: AtomicU64,
    next_incoming: AtomicU64,
}

impl CounterpartySession {
    pub fn new(alias: impl Into<String>, router: Arc<MessageRouter>) -> Self {
        CounterpartySession {
            alias: alias.into(),
            router,
            writer: Mutex::new(None),
            next_outgoing: AtomicU64::new(0),
            next_incoming: AtomicU64::new(0),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Connect and start the reader. The returned task ends when the
    /// counterparty goes away.
    pub async fn connect(self: &Arc<Self>, addr: &str) -> Result<JoinHandle<()>> {
        info!(session = %self.alias, "Connecting to {}...", addr);

        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to counterparty at {addr}"))?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        info!(session = %self.alias, "Connected successfully");

        let session = Arc::clone(self);
        Ok(tokio::spawn(async move {
            if let Err(e) = session.read_loop(read_half).await {
                error!(session = %session.alias, "Read error: {:#}", e);
            }
            *session.writer.lock().await = None;
        }))
    }

    /// Keep the session up until `shutdown`, reconnecting with
    /// exponential backoff (2 s, 4 s, ... capped at 32 s).
    pub async fn maintain(self: Arc<Self>, addr: String, shutdown: CancellationToken) {
        let mut reconnect_attempts: u32 = 0;

        loop {
            match self.connect(&addr).await {
                Ok(reader) => {
                    reconnect_attempts = 0;
                    tokio::select! {
                        _ = reader => {}
                        _ = shutdown.cancelled() => return,
                    }
                }
                Err(e) => error!(session = %self.alias, "Connection failed: {:#}", e),
            }

            reconnect_attempts += 1;
            let delay = Duration::from_millis(1000 * 2_u64.pow(reconnect_attempts.min(5)));
            warn!(session = %self.alias, "Connection lost, reconnecting in {:?}", delay);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }

    async fn read_loop(&self, mut read_half: OwnedReadHalf) -> Result<()> {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = read_half.read(&mut buf).await?;
            if n == 0 {
                info!(session = %self.alias, "Counterparty closed the connection");
                return Ok(());
            }
            decoder.extend(&buf[..n]);

            while let Some(frame) = decoder.next_frame()? {
                match decode_message(&frame) {
                    Ok(message) => self.ingest(message),
                    Err(e) => warn!(session = %self.alias, "Skipping malformed message: {}", e),
                }
            }
        }
    }

    /// Stamp an inbound message with its stream identity and publish it.
    fn ingest(&self, mut message: Message) {
        let seq = self.next_incoming.fetch_add(1, Ordering::Relaxed) + 1;
        message.id = MessageId::new(self.alias.clone(), Direction::Incoming, seq);
        debug!(id = %message.id, message_type = %message.message_type, "received");
        self.router.deliver(message);
    }
}

/// Drops the connection unless the frame was written in full. A write
/// abandoned midway leaves a partial frame on the wire.
struct PendingWrite<'a> {
    slot: &'a mut Option<OwnedWriteHalf>,
    armed: bool,
}

impl PendingWrite<'_> {
    async fn write_frame(&mut self, frame: &[u8]) -> Option<std::io::Result<()>> {
        let stream = self.slot.as_mut()?;
        let written = async {
            stream.write_all(frame).await?;
            stream.flush().await
        }
        .await;
        if written.is_ok() {
            self.armed = false;
        }
        Some(written)
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if self.armed && self.slot.take().is_some() {
            warn!("Outbound write abandoned; dropping the connection");
        }
    }
}

#[async_trait]
impl Transport for CounterpartySession {
    async fn send(&self, mut message: Message) -> Result<(), TransportError> {
        // Held across the write and the echo so echo order matches wire order.
        let mut writer = self.writer.lock().await;

        let seq = self.next_outgoing.load(Ordering::Relaxed) + 1;
        message.id = MessageId::new(self.alias.clone(), Direction::Outgoing, seq);

        let mut frame = BytesMut::with_capacity(256);
        encode_message(&message, &mut frame).map_err(|e| TransportError::Encode(e.to_string()))?;

        let mut pending = PendingWrite {
            slot: &mut *writer,
            armed: true,
        };
        match pending.write_frame(&frame).await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(TransportError::NotConnected(self.alias.clone())),
        }
        drop(pending);

        self.next_outgoing.store(seq, Ordering::Relaxed);
        debug!(id = %message.id, message_type = %message.message_type, "sent");

        self.router.deliver(message);
        Ok(())
    }
}

impl std::fmt::Debug for CounterpartySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterpartySession")
            .field("alias", &self.alias)
            .field("next_outgoing", &self.next_outgoing)
            .field("next_incoming", &self.next_incoming)
            .finish_non_exhaustive()
    }
}
