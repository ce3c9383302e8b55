//! Per-connection I/O for act clients.
//!
//! Requests arrive as one JSON object per line. Each runs as its own
//! task so a slow act never blocks the next request; replies are
//! written by a single writer task, one JSON line each, in completion
//! order.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::handlers::ActHandler;
use crate::types::{ActReply, ActRequest, ClientId, ClientRegistry, ReplyRx, ReplyTx};

/// Run the I/O loop for a single connection until EOF or `cancel`.
pub async fn run_client(
    client_id: ClientId,
    stream: TcpStream,
    handler: Arc<ActHandler>,
    cancel: CancellationToken,
    clients: ClientRegistry,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (reply_tx, reply_rx): (ReplyTx, ReplyRx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_replies(client_id, write_half, reply_rx));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                handle_line(client_id, line, &handler, &cancel, &reply_tx);
            }
            Ok(None) => {
                info!("Client {} disconnected", client_id.0);
                break;
            }
            Err(e) => {
                warn!("Client {} read error: {}", client_id.0, e);
                break;
            }
        }
    }

    // Nobody is left to read the answers: abort in-flight acts.
    cancel.cancel();
    {
        let mut guard = clients.write().await;
        guard.remove(&client_id);
    }

    drop(reply_tx);
    let _ = writer.await;
    Ok(())
}

fn handle_line(
    client_id: ClientId,
    line: &str,
    handler: &Arc<ActHandler>,
    cancel: &CancellationToken,
    reply_tx: &ReplyTx,
) {
    let request: ActRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Client {} invalid request: {}", client_id.0, e);
            let _ = reply_tx.send(ActReply::error(0, format!("invalid request: {e}")));
            return;
        }
    };

    debug!(
        "Client {} request {} -> {}",
        client_id.0, request.id, request.method
    );

    let handler = Arc::clone(handler);
    let cancel = cancel.clone();
    let reply_tx = reply_tx.clone();
    tokio::spawn(async move {
        let id = request.id;
        let reply = match handler.dispatch(request.method, request.request, &cancel).await {
            Ok(response) => ActReply::ok(id, response),
            Err(e) => ActReply::error(id, e.to_string()),
        };
        // The writer is gone once the client disconnects; the reply is moot.
        let _ = reply_tx.send(reply);
    });
}

async fn write_replies(client_id: ClientId, mut write_half: OwnedWriteHalf, mut reply_rx: ReplyRx) {
    while let Some(reply) = reply_rx.recv().await {
        if let Err(e) = write_reply(&mut write_half, &reply).await {
            warn!("Client {} write error: {}", client_id.0, e);
            break;
        }
    }
}

async fn write_reply(stream: &mut OwnedWriteHalf, reply: &ActReply) -> Result<()> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');

    stream.write_all(&line).await?;
    stream.flush().await?;
    Ok(())
}
