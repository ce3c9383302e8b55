//! Remote act service binary.

use std::path::PathBuf;

use act_server::config::Config;
use act_server::server;
use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "act-server")]
#[clap(about = "Sends act requests to a counterparty and correlates its replies")]
struct Cli {
    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Act listener port
    #[clap(short, long)]
    port: Option<u16>,

    /// Counterparty address (host:port)
    #[clap(long)]
    counterparty: Option<String>,

    /// Session alias of the counterparty session
    #[clap(long)]
    session: Option<String>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(counterparty) = cli.counterparty {
        config.counterparty_addr = counterparty;
    }
    if let Some(session) = cli.session {
        config.session_alias = session;
    }

    info!(
        "Starting act-server on {}:{} (max_clients = {}, counterparty = {})",
        config.bind_addr, config.port, config.max_clients, config.counterparty_addr
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
        });
    }

    server::run(config, shutdown).await
}
