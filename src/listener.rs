//! Listening socket and accept loop

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::handler::spawn_connection;
use crate::server::ServerCommand;

/// Pause after an accept failure that is not tied to one connection
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the listening socket with `SO_REUSEADDR` and the given backlog
pub fn bind(addr: SocketAddr, backlog: u32) -> Result<TcpListener, AppError> {
    let bind_err = |source| AppError::Bind { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)
}

/// Accept connections forever, one handler task each
///
/// A failed accept never stops the loop. Failures caused by a single
/// aborted connection are retried at once; anything else (e.g. running out
/// of file descriptors) is logged as an error and retried after a pause.
pub async fn accept_connections(listener: TcpListener, cmd_tx: mpsc::Sender<ServerCommand>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                spawn_connection(stream, addr, cmd_tx.clone());
            }
            Err(e) if is_per_connection(&e) => {
                warn!("Accept aborted: {}", e);
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

fn is_per_connection(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}
