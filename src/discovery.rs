//! Address discovery
//!
//! Finds the address other machines can reach this host on and publishes
//! `<host>:<port>` in a side file for clients to read.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use tokio::net::UdpSocket;
use tracing::info;

use crate::error::AppError;

/// Local address of the interface that routes to `probe`
///
/// Connecting a UDP socket only selects a route; no packet is sent.
pub async fn outbound_ip(probe: &str) -> Result<IpAddr, AppError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(AppError::Discovery)?;
    socket.connect(probe).await.map_err(AppError::Discovery)?;
    let local = socket.local_addr().map_err(AppError::Discovery)?;
    Ok(local.ip())
}

/// The published `<host>:<port>` record
#[derive(Debug)]
pub struct DiscoveryFile {
    path: PathBuf,
}

impl DiscoveryFile {
    /// Write the record for `addr` to `path`, replacing any previous one
    pub async fn create(path: impl Into<PathBuf>, addr: SocketAddr) -> Result<Self, AppError> {
        let path = path.into();
        tokio::fs::write(&path, record(addr))
            .await
            .map_err(|source| AppError::DiscoveryFile {
                path: path.clone(),
                source,
            })?;
        info!("Wrote {} to {}", addr, path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the record
    pub async fn remove(self) -> Result<(), AppError> {
        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|source| AppError::DiscoveryFile {
                path: self.path.clone(),
                source,
            })?;
        info!("Removed {}", self.path.display());
        Ok(())
    }
}

fn record(addr: SocketAddr) -> String {
    format!("{}\n", addr)
}
