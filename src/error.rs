//! Error types for the chat server
//!
//! Defines process-level errors, per-connection errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// Only these may terminate the process. Everything that concerns a single
/// peer is a [`PeerError`] and stays inside the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// The listening socket could not be set up
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The outbound-routable address could not be determined
    #[error("Failed to discover local address: {0}")]
    Discovery(std::io::Error),

    /// The discovery file could not be written or removed
    #[error("Discovery file {path}: {source}")]
    DiscoveryFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Why a single connection ended
///
/// Every variant drives the same cleanup; they differ in logging and in
/// the offline notice that is broadcast.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Empty read: the peer closed its side
    #[error("Connection closed by peer")]
    Closed,

    /// Reading from the socket failed
    #[error("Read error: {0}")]
    Read(std::io::Error),

    /// Writing to the socket failed
    #[error("Write error: {0}")]
    Write(std::io::Error),

    /// The peer was gone before its address could be looked up
    #[error("Peer address unresolvable: {0}")]
    AddressUnresolvable(std::io::Error),

    /// The server could not hand a broadcast to the peer's writer
    #[error("Send to peer failed")]
    Send,
}

impl PeerError {
    /// True for an orderly close, false for every failure
    pub fn is_clean(&self) -> bool {
        matches!(self, PeerError::Closed)
    }
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
