//! Broadcast Chat Server - Entry Point
//!
//! Binds the listener, publishes the discovery file, starts the ChatServer
//! actor and accepts connections until interrupted.

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use broadcast_chat::{accept_connections, listener, ChatServer, Config, DiscoveryFile};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=broadcast_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("broadcast_chat=info")),
        )
        .init();

    let config = Config::parse();

    let addr = config.listen_addr().await?;
    let listener = listener::bind(addr, config.backlog)?;
    let discovery = DiscoveryFile::create(&config.discovery_file, addr).await?;
    info!(
        "Chat server started: {} (record in {})",
        addr,
        discovery.path().display()
    );

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(ChatServer::new(cmd_rx).run());

    info!("ChatServer actor started");

    let interrupted = tokio::select! {
        _ = accept_connections(listener, cmd_tx) => Ok(()),
        signal = tokio::signal::ctrl_c() => signal,
    };
    info!("Interrupted, shutting down");

    discovery.remove().await?;
    interrupted?;

    Ok(())
}
