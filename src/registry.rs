//! Connection registry
//!
//! Maps each live peer's address to its entry. Owned by the `ChatServer`
//! actor; nothing else mutates it.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::peer::Peer;
use crate::types::ConnectionId;

/// All live peers, keyed by remote address
#[derive(Debug, Default)]
pub struct Registry {
    peers: HashMap<SocketAddr, Peer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted peer
    ///
    /// Returns the previous entry for the same address, if any.
    pub fn insert(&mut self, peer: Peer) -> Option<Peer> {
        self.peers.insert(peer.addr, peer)
    }

    /// Look up the peer for `addr` if it belongs to connection `id`
    pub fn get_mut(&mut self, addr: &SocketAddr, id: ConnectionId) -> Option<&mut Peer> {
        self.peers.get_mut(addr).filter(|peer| peer.id == id)
    }

    /// Remove the peer for `addr` if it belongs to connection `id`
    ///
    /// A stale id leaves a newer connection on the same address untouched.
    pub fn remove(&mut self, addr: &SocketAddr, id: ConnectionId) -> Option<Peer> {
        match self.peers.get(addr) {
            Some(peer) if peer.id == id => self.peers.remove(addr),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::peer::PeerState;
    use crate::types::Handle;

    fn peer(addr: &str) -> Peer {
        let (tx, _rx) = mpsc::channel(1);
        Peer::new(ConnectionId::new(), addr.parse().unwrap(), tx)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = Registry::new();
        let a = peer("10.0.0.1:1000");
        let (addr, id) = (a.addr, a.id);

        assert!(registry.insert(a).is_none());
        assert!(registry.contains(&addr));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&addr, id).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(&addr, id).is_none());
    }

    #[test]
    fn test_stale_id_is_ignored() {
        let mut registry = Registry::new();
        let old = peer("10.0.0.1:1000");
        let (addr, old_id) = (old.addr, old.id);
        registry.insert(old);
        registry.remove(&addr, old_id);

        let new = peer("10.0.0.1:1000");
        let new_id = new.id;
        registry.insert(new);

        assert!(registry.get_mut(&addr, old_id).is_none());
        assert!(registry.remove(&addr, old_id).is_none());
        assert!(registry.get_mut(&addr, new_id).is_some());
    }

    #[test]
    fn test_removal_leaves_others_intact() {
        let mut registry = Registry::new();
        let a = peer("10.0.0.1:1000");
        let mut b = peer("10.0.0.2:2000");
        b.name(Handle::from("bob"));
        let (a_addr, a_id) = (a.addr, a.id);
        let (b_addr, b_id) = (b.addr, b.id);
        registry.insert(a);
        registry.insert(b);

        registry.remove(&a_addr, a_id);

        let b = registry.get_mut(&b_addr, b_id).unwrap();
        assert_eq!(b.state(), PeerState::Named);
        assert_eq!(b.handle, Some(Handle::from("bob")));
        assert_eq!(registry.len(), 1);
    }
}
