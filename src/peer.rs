//! Peer struct definition
//!
//! Represents a live connection with its handle and outbound channel.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::{ConnectionId, Handle};

/// Lifecycle of a connection while it is registered
///
/// `Closed` has no variant: a closed peer is no longer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Accepted, no message processed yet
    Unregistered,
    /// Handle assigned; never goes back
    Named,
}

/// Connected peer information
#[derive(Debug)]
pub struct Peer {
    /// Identifier of the accepted connection
    pub id: ConnectionId,
    /// Remote address, the registry key
    pub addr: SocketAddr,
    /// Handle (None before the first message)
    pub handle: Option<Handle>,
    /// Server → writer task channel
    pub sender: mpsc::Sender<String>,
}

impl Peer {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            addr,
            handle: None,
            sender,
        }
    }

    /// Queue text for this peer's socket
    ///
    /// Returns an error if the channel is closed (writer task gone).
    pub async fn send(&self, text: String) -> Result<(), SendError> {
        self.sender
            .send(text)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    pub fn state(&self) -> PeerState {
        if self.handle.is_some() {
            PeerState::Named
        } else {
            PeerState::Unregistered
        }
    }

    /// Assign the handle unless one is already stored
    ///
    /// Returns the stored handle, which is `handle` only on the first call.
    pub fn name(&mut self, handle: Handle) -> &Handle {
        self.handle.get_or_insert(handle)
    }
}
