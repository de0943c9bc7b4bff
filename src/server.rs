//! ChatServer Actor implementation
//!
//! The central actor that owns the registry and the guest counter.
//! Connection handlers talk to it over an mpsc channel, so every registry
//! mutation and every broadcast happens on this one task.

use std::collections::VecDeque;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::PeerError;
use crate::guest::GuestNames;
use crate::peer::Peer;
use crate::protocol;
use crate::registry::Registry;
use crate::types::{ConnectionId, Handle};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        addr: SocketAddr,
        id: ConnectionId,
        sender: mpsc::Sender<String>,
    },
    /// Text read from a peer
    Line {
        addr: SocketAddr,
        id: ConnectionId,
        text: String,
    },
    /// Connection ended
    Disconnect {
        addr: SocketAddr,
        id: ConnectionId,
        reason: PeerError,
    },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Live peers: SocketAddr -> Peer
    registry: Registry,
    /// Handles for peers that do not claim one
    guests: GuestNames,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self::with_guests(receiver, GuestNames::new())
    }

    /// Create a ChatServer drawing guest handles from `guests`
    pub fn with_guests(receiver: mpsc::Receiver<ServerCommand>, guests: GuestNames) -> Self {
        Self {
            registry: Registry::new(),
            guests,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { addr, id, sender } => {
                self.handle_connect(addr, id, sender);
            }
            ServerCommand::Line { addr, id, text } => {
                self.handle_line(addr, id, text).await;
            }
            ServerCommand::Disconnect { addr, id, reason } => {
                self.handle_disconnect(addr, id, reason).await;
            }
        }
    }

    /// Handle a new connection: registered without a handle
    fn handle_connect(&mut self, addr: SocketAddr, id: ConnectionId, sender: mpsc::Sender<String>) {
        info!("Peer {} connected ({})", addr, id);

        if let Some(previous) = self.registry.insert(Peer::new(id, addr, sender)) {
            warn!(
                "Peer {} replaced stale connection {} on the same address",
                addr, previous.id
            );
        }

        debug!("Total peers: {}", self.registry.len());
    }

    /// Handle text read from a peer
    ///
    /// The first message names the peer and is prefixed with a `Connected`
    /// announcement. Later messages carry the stored handle whatever tag
    /// the peer sent this time.
    async fn handle_line(&mut self, addr: SocketAddr, id: ConnectionId, text: String) {
        let Some(peer) = self.registry.get_mut(&addr, id) else {
            debug!("Dropping text from closed connection {} ({})", addr, id);
            return;
        };

        debug!("Text from {} ({:?})", addr, peer.state());

        let message = match peer.handle.clone() {
            Some(stored) => protocol::rewrite(&text, &stored),
            None => {
                let claimed = protocol::claimed_name(&text).map(Handle::from);
                let handle = peer.name(claimed.unwrap_or_else(|| self.guests.next()));
                info!("Peer {} is now '{}'", addr, handle);

                let mut message = protocol::connected_notice(addr, handle);
                message.push_str(&protocol::rewrite(&text, handle));
                message
            }
        };

        self.broadcast(message).await;
    }

    /// Handle a connection ending for any reason
    async fn handle_disconnect(&mut self, addr: SocketAddr, id: ConnectionId, reason: PeerError) {
        match self.close_peer(addr, id, reason) {
            Some(notice) => self.broadcast(notice).await,
            None => debug!("Connection {} ({}) already closed", addr, id),
        }
    }

    /// Broadcast text to every peer, the sender included
    ///
    /// A peer whose channel is closed is dropped from the registry and its
    /// offline notice goes out after the current pass.
    async fn broadcast(&mut self, message: String) {
        let mut queue = VecDeque::from([message]);

        while let Some(message) = queue.pop_front() {
            info!("{}", message.trim_end());

            let mut failed = Vec::new();
            for peer in self.registry.iter() {
                if peer.send(message.clone()).await.is_err() {
                    failed.push((peer.addr, peer.id));
                }
            }

            for (addr, id) in failed {
                if let Some(notice) = self.close_peer(addr, id, PeerError::Send) {
                    queue.push_back(notice);
                }
            }
        }
    }

    /// Remove a peer and build its offline notice
    ///
    /// Returns `None` if the connection was already removed, so each
    /// connection is announced offline at most once. Dropping the peer
    /// closes its channel, which stops its writer task.
    fn close_peer(&mut self, addr: SocketAddr, id: ConnectionId, reason: PeerError) -> Option<String> {
        let peer = self.registry.remove(&addr, id)?;
        let handle = peer.handle.as_ref();
        let name = handle.map(Handle::as_str).unwrap_or_default();

        match &reason {
            PeerError::Closed => info!("Peer {} '{}' disconnected", addr, name),
            PeerError::AddressUnresolvable(e) => {
                warn!("Peer {} vanished before its address resolved: {}", addr, e)
            }
            PeerError::Send => warn!("Peer {} '{}' dropped: broadcast failed", addr, name),
            PeerError::Read(e) | PeerError::Write(e) => {
                warn!("Peer {} '{}' dropped: {}", addr, name, e)
            }
        }
        if self.registry.is_empty() {
            debug!("No peers left");
        } else {
            debug!("Total peers: {}", self.registry.len());
        }

        Some(protocol::offline_notice(addr, handle, reason.is_clean()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A peer backed by a channel instead of a socket
    struct TestPeer {
        addr: SocketAddr,
        id: ConnectionId,
        rx: mpsc::Receiver<String>,
    }

    impl TestPeer {
        fn drain(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(text) = self.rx.try_recv() {
                out.push(text);
            }
            out
        }
    }

    fn server() -> ChatServer {
        let (_tx, rx) = mpsc::channel(8);
        ChatServer::new(rx)
    }

    async fn connect(server: &mut ChatServer, addr: &str) -> TestPeer {
        let (tx, rx) = mpsc::channel(32);
        let addr = addr.parse().unwrap();
        let id = ConnectionId::new();
        server
            .handle_command(ServerCommand::Connect { addr, id, sender: tx })
            .await;
        TestPeer { addr, id, rx }
    }

    async fn say(server: &mut ChatServer, peer: &TestPeer, text: &str) {
        server
            .handle_command(ServerCommand::Line {
                addr: peer.addr,
                id: peer.id,
                text: text.to_string(),
            })
            .await;
    }

    async fn hang_up(server: &mut ChatServer, peer: &TestPeer, reason: PeerError) {
        server
            .handle_command(ServerCommand::Disconnect {
                addr: peer.addr,
                id: peer.id,
                reason,
            })
            .await;
    }

    fn handle_of(server: &mut ChatServer, peer: &TestPeer) -> Option<Handle> {
        server
            .registry
            .get_mut(&peer.addr, peer.id)
            .and_then(|p| p.handle.clone())
    }

    #[tokio::test]
    async fn test_first_message_claims_handle() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;

        say(&mut server, &a, "[alice] hi").await;

        assert_eq!(handle_of(&mut server, &a), Some(Handle::from("alice")));
        assert_eq!(a.drain(), vec!["Connected 10.0.0.1:4000 alice\n[alice] hi"]);
    }

    #[tokio::test]
    async fn test_later_tags_are_ignored() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;
        say(&mut server, &a, "[alice] hi").await;
        a.drain();

        say(&mut server, &a, "[bob] second").await;

        assert_eq!(a.drain(), vec!["[alice] second"]);
        assert_eq!(handle_of(&mut server, &a), Some(Handle::from("alice")));
    }

    #[tokio::test]
    async fn test_empty_tag_gets_guest_handle() {
        let mut server = server();
        let mut b = connect(&mut server, "10.0.0.2:4000").await;

        say(&mut server, &b, "[] yo").await;

        assert_eq!(b.drain(), vec!["Connected 10.0.0.2:4000 guest1\n[guest1] yo"]);
    }

    #[tokio::test]
    async fn test_untagged_first_message_passes_through() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;

        say(&mut server, &a, "no tag\n").await;

        assert_eq!(a.drain(), vec!["Connected 10.0.0.1:4000 guest1\nno tag\n"]);
        assert_eq!(handle_of(&mut server, &a), Some(Handle::from("guest1")));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;
        let mut b = connect(&mut server, "10.0.0.2:4000").await;
        let mut c = connect(&mut server, "10.0.0.3:4000").await;

        say(&mut server, &b, "[bea] hello").await;

        let expected = vec!["Connected 10.0.0.2:4000 bea\n[bea] hello".to_string()];
        assert_eq!(a.drain(), expected);
        assert_eq!(b.drain(), expected);
        assert_eq!(c.drain(), expected);
    }

    #[tokio::test]
    async fn test_disconnect_scenario() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;
        let mut b = connect(&mut server, "10.0.0.2:4000").await;
        say(&mut server, &a, "[alice] hi").await;
        say(&mut server, &b, "[] yo").await;
        a.drain();
        b.drain();

        hang_up(&mut server, &a, PeerError::Closed).await;

        assert_eq!(b.drain(), vec!["Offline1 alice 10.0.0.1:4000\n"]);
        assert!(!server.registry.contains(&a.addr));
        assert_eq!(handle_of(&mut server, &b), Some(Handle::from("guest1")));

        // The counter carries on after a disconnect
        let mut c = connect(&mut server, "10.0.0.3:4000").await;
        say(&mut server, &c, "[] hey").await;
        assert_eq!(handle_of(&mut server, &c), Some(Handle::from("guest2")));
        assert_eq!(c.drain(), vec!["Connected 10.0.0.3:4000 guest2\n[guest2] hey"]);
    }

    #[tokio::test]
    async fn test_offline_notice_sent_once() {
        let mut server = server();
        let a = connect(&mut server, "10.0.0.1:4000").await;
        let mut b = connect(&mut server, "10.0.0.2:4000").await;

        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        hang_up(&mut server, &a, PeerError::Read(reset)).await;
        hang_up(&mut server, &a, PeerError::Closed).await;

        // Never named, so the handle is empty
        assert_eq!(b.drain(), vec!["Offline2 10.0.0.1:4000 \n"]);
        assert_eq!(server.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_address_closes_unnamed_peer() {
        let mut server = server();
        let a = connect(&mut server, "10.0.0.1:4000").await;
        let mut b = connect(&mut server, "10.0.0.2:4000").await;

        let gone = std::io::Error::from(std::io::ErrorKind::NotConnected);
        hang_up(&mut server, &a, PeerError::AddressUnresolvable(gone)).await;

        assert_eq!(b.drain(), vec!["Offline2 10.0.0.1:4000 \n"]);
        assert!(!server.registry.contains(&a.addr));
        assert_eq!(server.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes_named_peer() {
        let mut server = server();
        let a = connect(&mut server, "10.0.0.1:4000").await;
        let mut b = connect(&mut server, "10.0.0.2:4000").await;
        say(&mut server, &a, "[alice] hi").await;
        b.drain();

        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        hang_up(&mut server, &a, PeerError::Write(broken)).await;

        assert_eq!(b.drain(), vec!["Offline2 10.0.0.1:4000 alice\n"]);
        assert!(!server.registry.contains(&a.addr));
        assert_eq!(handle_of(&mut server, &b), None);
    }

    #[tokio::test]
    async fn test_failed_send_prunes_peer() {
        let mut server = server();
        let mut a = connect(&mut server, "10.0.0.1:4000").await;
        let b = connect(&mut server, "10.0.0.2:4000").await;
        let mut c = connect(&mut server, "10.0.0.3:4000").await;
        say(&mut server, &b, "[bob] here").await;
        a.drain();
        c.drain();

        let TestPeer { addr: b_addr, rx, .. } = b;
        drop(rx);

        say(&mut server, &a, "[amy] anyone?").await;

        let expected = vec![
            "Connected 10.0.0.1:4000 amy\n[amy] anyone?".to_string(),
            format!("Offline2 {} bob\n", b_addr),
        ];
        assert_eq!(a.drain(), expected);
        assert_eq!(c.drain(), expected);
        assert!(!server.registry.contains(&b_addr));
        assert_eq!(server.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_connection_commands_ignored() {
        let mut server = server();
        let old = connect(&mut server, "10.0.0.1:4000").await;
        hang_up(&mut server, &old, PeerError::Closed).await;
        let mut new = connect(&mut server, "10.0.0.1:4000").await;

        say(&mut server, &old, "[ghost] boo").await;
        hang_up(&mut server, &old, PeerError::Send).await;

        assert!(new.drain().is_empty());
        assert!(server.registry.contains(&new.addr));
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_dropped() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(ChatServer::new(rx).run());
        drop(tx);
        handle.await.unwrap();
    }
}
