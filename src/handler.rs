//! TCP connection handler
//!
//! Handles individual peer connections: registration with the ChatServer,
//! a read task turning socket reads into commands and a write task
//! delivering broadcasts to the socket.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, PeerError};
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Bytes read from a peer at a time
pub const RECV_BUFFER: usize = 4096;

/// Broadcasts queued per peer before the server waits on its writer
const PEER_CHANNEL_SIZE: usize = 32;

/// Handle an accepted TCP connection
///
/// `addr` is the address reported by `accept`. The connection is registered
/// under it right away; if the peer is already gone when its address is
/// looked up again, the connection is closed as unresolvable using that
/// accept-time address.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let id = ConnectionId::new();

    // Channel for server -> peer broadcasts
    let (msg_tx, mut msg_rx) = mpsc::channel::<String>(PEER_CHANNEL_SIZE);

    if cmd_tx
        .send(ServerCommand::Connect {
            addr,
            id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register peer {} - server closed", addr);
        return Err(AppError::ChannelSend);
    }

    if let Err(e) = stream.peer_addr() {
        let _ = cmd_tx
            .send(ServerCommand::Disconnect {
                addr,
                id,
                reason: PeerError::AddressUnresolvable(e),
            })
            .await;
        return Ok(());
    }

    let (mut reader, mut writer) = stream.into_split();
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (socket -> ServerCommand)
    let mut read_task = tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER];
        let mut pending = Vec::new();
        loop {
            let text = match reader.read(&mut buf).await {
                Ok(0) if pending.is_empty() => return PeerError::Closed,
                Ok(0) => {
                    // Peer left mid-character; flush what is left
                    let text = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    text
                }
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    decode_available(&mut pending)
                }
                Err(e) => return PeerError::Read(e),
            };
            if text.is_empty() {
                continue;
            }

            let cmd = ServerCommand::Line { addr, id, text };
            if cmd_tx_read.send(cmd).await.is_err() {
                debug!("Server closed, ending read task for {}", addr);
                return PeerError::Closed;
            }
        }
    });

    // Spawn write task (broadcast -> socket)
    //
    // Ends with `None` once the server drops this peer's channel.
    let mut write_task = tokio::spawn(async move {
        while let Some(text) = msg_rx.recv().await {
            if let Err(e) = writer.write_all(text.as_bytes()).await {
                return Some(PeerError::Write(e));
            }
        }
        debug!("Write task ended for {}", addr);
        None
    });

    // Wait for either task to complete, then tear down the other
    let reason = tokio::select! {
        reason = &mut read_task => {
            Some(reason.unwrap_or_else(|e| PeerError::Read(std::io::Error::other(e))))
        }
        reason = &mut write_task => {
            reason.unwrap_or_else(|e| Some(PeerError::Write(std::io::Error::other(e))))
        }
    };
    read_task.abort();
    write_task.abort();

    match reason {
        Some(reason) => {
            debug!("Connection {} ended: {}", addr, reason);
            let _ = cmd_tx
                .send(ServerCommand::Disconnect { addr, id, reason })
                .await;
        }
        None => debug!("Connection {} dropped by server", addr),
    }

    info!("Connection {} closed", addr);

    Ok(())
}

/// Decode the complete UTF-8 text at the front of `pending`
///
/// A character cut off by the end of a read stays in `pending` for the
/// next read. Invalid bytes become U+FFFD.
fn decode_available(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    let mut rest: &[u8] = pending;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }

    let consumed = pending.len() - rest.len();
    pending.drain(..consumed);
    text
}

/// Spawn a handler for one accepted stream
pub fn spawn_connection(stream: TcpStream, addr: SocketAddr, cmd_tx: mpsc::Sender<ServerCommand>) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, addr, cmd_tx).await {
            warn!("Connection handler error for {}: {}", addr, e);
        }
    });
}
