//! Broadcast Chat Server Library
//!
//! A single-room TCP chat server: every chunk of text a peer sends is
//! broadcast to all connected peers, the sender included.
//!
//! # Protocol
//! Text may carry a bracket name tag, e.g. `[alice] hello`. The tag of a
//! peer's first message claims its handle (an empty tag gets `guestN`);
//! the server announces `Connected <addr> <handle>` and from then on
//! rewrites the first tag of every message to the stored handle.
//! When a peer goes away the others receive an `Offline1`/`Offline2` notice.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the registry and guest counter
//! - Each connection has a read task and a write task talking to the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use broadcast_chat::{accept_connections, listener, ChatServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = listener::bind("127.0.0.1:50000".parse().unwrap(), 10).unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!     accept_connections(listener, cmd_tx).await;
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod guest;
pub mod handler;
pub mod listener;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use discovery::DiscoveryFile;
pub use error::{AppError, PeerError, SendError};
pub use guest::GuestNames;
pub use handler::handle_connection;
pub use listener::accept_connections;
pub use peer::{Peer, PeerState};
pub use registry::Registry;
pub use server::{ChatServer, ServerCommand};
pub use types::{ConnectionId, Handle};
