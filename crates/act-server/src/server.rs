//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Builds the router, the counterparty session and the engine.
//! - Keeps the counterparty session connected in the background.
//! - Listens on the configured address/port for act clients.
//! - Assigns each connection a `ClientId` and spawns its I/O task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use act_engine::{ActEngine, MessageRouter};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client;
use crate::config::Config;
use crate::handlers::ActHandler;
use crate::session::CounterpartySession;
use crate::types::{ClientId, ClientRegistry};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    ClientId(id)
}

/// Run the server until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<()> {
    let router = Arc::new(MessageRouter::new());
    let session = Arc::new(CounterpartySession::new(
        config.session_alias.clone(),
        Arc::clone(&router),
    ));
    tokio::spawn(
        Arc::clone(&session).maintain(config.counterparty_addr.clone(), shutdown.clone()),
    );

    let engine = Arc::new(ActEngine::new(router, session, config.engine.clone()));
    let handler = Arc::new(ActHandler::new(engine, config.session_alias.clone()));

    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding act listener on {addr}"))?;
    info!("Listening on {}", addr);

    serve(listener, handler, config.max_clients, shutdown).await
}

/// Accept act clients on `listener` until `shutdown` is cancelled.
/// Cancelling `shutdown` also cancels every client's in-flight acts.
pub async fn serve(
    listener: TcpListener,
    handler: Arc<ActHandler>,
    max_clients: usize,
    shutdown: CancellationToken,
) -> Result<()> {
    let clients: ClientRegistry = Arc::new(tokio::sync::RwLock::new(Default::default()));

    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted?,
        };

        let current_clients = {
            let guard = clients.read().await;
            guard.len()
        };

        if current_clients >= max_clients {
            warn!(
                "Rejecting connection from {}: max_clients ({}) reached",
                peer_addr, max_clients
            );
            // Dropping the stream closes it.
            continue;
        }

        let client_id = next_client_id();
        info!("Accepted connection {} from {}", client_id.0, peer_addr);

        let cancel = shutdown.child_token();
        {
            let mut guard = clients.write().await;
            guard.insert(client_id, cancel.clone());
        }

        let clients_clone = clients.clone();
        let handler_clone = Arc::clone(&handler);

        tokio::spawn(async move {
            if let Err(e) =
                client::run_client(client_id, stream, handler_clone, cancel, clients_clone).await
            {
                warn!("Client {} error: {:#}", client_id.0, e);
            }
        });
    }

    info!("Shutting down listener");
    Ok(())
}
