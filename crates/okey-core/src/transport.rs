//! The seam between the engine and whatever carries snapshots between peers.
//!
//! The engine only needs a reliable, ordered broadcast to every other
//! participant. [`Transport`] is that contract; [`LocalHub`] is an in-memory
//! implementation for tests and same-process sessions.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Transport failures. These never reach the board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,

    #[error("Transport failed to open: {0}")]
    Open(String),
}

/// A participant as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: Uuid,
    pub name: String,
}

/// Something the transport delivers to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw snapshot bytes from another participant
    SnapshotReceived(Vec<u8>),
    /// A participant connected
    PeerJoined(PeerInfo),
    /// A participant disconnected
    PeerLeft(PeerInfo),
}

/// Reliable ordered broadcast to all other participants.
///
/// `broadcast` is fire-and-forget: it must not block on delivery.
pub trait Transport: Send {
    /// Start delivering. Calling it on an open transport is a no-op.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Send bytes to every other participant
    fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Stop delivering and release the connection
    fn close(&mut self);
}

struct HubPeer {
    info: PeerInfo,
    inbox: Sender<TransportEvent>,
}

/// In-memory broadcast hub. Every peer's inbox receives events in the order
/// they were broadcast.
#[derive(Clone, Default)]
pub struct LocalHub {
    peers: Arc<Mutex<Vec<HubPeer>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant. Returns its transport handle and its inbox.
    pub fn connect(&self, name: impl Into<String>) -> (LocalTransport, Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel();
        let info = PeerInfo {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        let transport = LocalTransport {
            hub: self.clone(),
            info: info.clone(),
            inbox: tx,
            open: false,
        };
        (transport, rx)
    }

    fn send_except(&self, from: Uuid, event: TransportEvent) {
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        for peer in peers.iter().filter(|p| p.info.id != from) {
            // A dropped inbox just means that peer went away
            let _ = peer.inbox.send(event.clone());
        }
    }

    /// Number of open participants
    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// One participant's handle on a [`LocalHub`]
pub struct LocalTransport {
    hub: LocalHub,
    info: PeerInfo,
    inbox: Sender<TransportEvent>,
    open: bool,
}

impl LocalTransport {
    pub fn peer(&self) -> &PeerInfo {
        &self.info
    }
}

impl Transport for LocalTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.open {
            return Ok(());
        }
        self.hub
            .send_except(self.info.id, TransportEvent::PeerJoined(self.info.clone()));
        let mut peers = self.hub.peers.lock().unwrap_or_else(|e| e.into_inner());
        // Tell the newcomer who is already here
        for peer in peers.iter() {
            let _ = self
                .inbox
                .send(TransportEvent::PeerJoined(peer.info.clone()));
        }
        peers.push(HubPeer {
            info: self.info.clone(),
            inbox: self.inbox.clone(),
        });
        self.open = true;
        Ok(())
    }

    fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.hub
            .send_except(self.info.id, TransportEvent::SnapshotReceived(payload));
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        {
            let mut peers = self.hub.peers.lock().unwrap_or_else(|e| e.into_inner());
            peers.retain(|p| p.info.id != self.info.id);
        }
        self.hub
            .send_except(self.info.id, TransportEvent::PeerLeft(self.info.clone()));
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_skips_sender() {
        let hub = LocalHub::new();
        let (mut a, a_rx) = hub.connect("A");
        let (mut b, b_rx) = hub.connect("B");
        a.open().unwrap();
        b.open().unwrap();

        a.broadcast(b"one".to_vec()).unwrap();
        a.broadcast(b"two".to_vec()).unwrap();

        let received: Vec<TransportEvent> = b_rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                TransportEvent::PeerJoined(a.peer().clone()),
                TransportEvent::SnapshotReceived(b"one".to_vec()),
                TransportEvent::SnapshotReceived(b"two".to_vec()),
            ]
        );

        let own: Vec<TransportEvent> = a_rx.try_iter().collect();
        assert_eq!(own, vec![TransportEvent::PeerJoined(b.peer().clone())]);
    }

    #[test]
    fn test_closed_transport_refuses_broadcast() {
        let hub = LocalHub::new();
        let (mut a, _rx) = hub.connect("A");
        assert_eq!(a.broadcast(Vec::new()), Err(TransportError::Closed));
        a.open().unwrap();
        a.close();
        assert_eq!(a.broadcast(Vec::new()), Err(TransportError::Closed));
        assert_eq!(hub.peer_count(), 0);
    }

    #[test]
    fn test_close_notifies_others() {
        let hub = LocalHub::new();
        let (mut a, _a_rx) = hub.connect("A");
        let (mut b, b_rx) = hub.connect("B");
        b.open().unwrap();
        a.open().unwrap();
        let info = a.peer().clone();
        drop(a);

        let received: Vec<TransportEvent> = b_rx.try_iter().collect();
        assert_eq!(
            received,
            vec![TransportEvent::PeerJoined(info.clone()), TransportEvent::PeerLeft(info)]
        );
    }
}
