//! Client side of the relay: a [`Transport`] over a WebSocket connection.
//!
//! A client connects, joins a room, waits for [`GameStart`], then hands the
//! connection to a [`SessionHandle`]. From that point every inbound relay
//! message is translated into a [`TransportEvent`] and delivered to the
//! controller in arrival order.

use crate::protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use okey_core::{
    GameBoard, GameController, PeerInfo, Seat, SessionHandle, Transport, TransportError,
    TransportEvent,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use uuid::Uuid;

/// Deal parameters announced by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStart {
    pub seat: Seat,
    pub player_names: Vec<String>,
    pub seed: u64,
}

impl GameStart {
    /// Build this client's board. Every seat gets the same one.
    pub fn board(&self) -> Result<GameBoard, okey_core::BoardError> {
        GameBoard::with_names(self.player_names.clone(), self.seed)
    }
}

/// An open connection to the relay
pub struct RelayConnection {
    player_id: Uuid,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayConnection {
    /// Connect and wait for the relay's welcome
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&msg) else {
                    continue;
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server_msg) => {
                            if in_tx.send(server_msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Unreadable relay message: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        let player_id = match in_rx.recv().await {
            Some(ServerMessage::Welcome { player_id }) => player_id,
            other => anyhow::bail!("expected Welcome from relay, got {:?}", other),
        };

        Ok(Self {
            player_id,
            outgoing: out_tx,
            incoming: in_rx,
            tasks: vec![writer, reader],
        })
    }

    /// Connection id assigned by the relay
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), TransportError> {
        self.outgoing.send(msg).map_err(|_| TransportError::Closed)
    }

    /// Next message from the relay, or `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    /// Wait until the relay deals. Lobby traffic before that is skipped,
    /// relay errors are returned.
    pub async fn wait_for_start(&mut self) -> anyhow::Result<GameStart> {
        loop {
            match self.recv().await {
                Some(ServerMessage::GameStarted {
                    seat,
                    player_names,
                    seed,
                }) => {
                    return Ok(GameStart {
                        seat,
                        player_names,
                        seed,
                    })
                }
                Some(ServerMessage::Error { message }) => anyhow::bail!("relay error: {}", message),
                Some(other) => debug!("Lobby message {:?}", other),
                None => anyhow::bail!("relay closed before the game started"),
            }
        }
    }

    /// A transport that broadcasts through this connection
    pub fn transport(&self) -> RelayTransport {
        RelayTransport {
            outgoing: self.outgoing.clone(),
            open: false,
        }
    }

    /// Build the seated controller for `start`, open it, and spawn a task
    /// that feeds relay traffic into the returned handle.
    pub fn into_session(self, start: &GameStart) -> anyhow::Result<(SessionHandle, JoinHandle<()>)> {
        let mut controller =
            GameController::multiplayer(start.board()?, start.seat, Box::new(self.transport()))?;
        controller.open()?;

        let session = SessionHandle::new(controller);
        let driver = tokio::spawn(self.drive(session.clone()));
        Ok((session, driver))
    }

    async fn drive(mut self, session: SessionHandle) {
        let mut roster = RosterTracker::new(self.player_id);
        while let Some(msg) = self.incoming.recv().await {
            for event in roster.translate(msg) {
                session.deliver(event);
            }
        }
        debug!("Relay connection {} ended", self.player_id);
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// [`Transport`] that sends snapshots to the relay room
pub struct RelayTransport {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    open: bool,
}

impl Transport for RelayTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.outgoing.is_closed() {
            return Err(TransportError::Open("relay connection is gone".into()));
        }
        self.open = true;
        Ok(())
    }

    fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        // The relay inspects snapshots, so they travel as JSON values
        let state = serde_json::from_slice(&payload)
            .map_err(|e| TransportError::Open(format!("payload is not JSON: {}", e)))?;
        self.outgoing
            .send(ClientMessage::Snapshot { state })
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.outgoing.send(ClientMessage::LeaveRoom);
        }
    }
}

/// Turns relay messages into controller deliveries. Roster changes are
/// derived by diffing each room update against the connected peers seen so
/// far.
pub struct RosterTracker {
    me: Uuid,
    known: HashMap<Uuid, String>,
}

impl RosterTracker {
    pub fn new(me: Uuid) -> Self {
        Self {
            me,
            known: HashMap::new(),
        }
    }

    pub fn translate(&mut self, msg: ServerMessage) -> Vec<TransportEvent> {
        match msg {
            ServerMessage::Snapshot { state, .. } => match serde_json::to_vec(&state) {
                Ok(bytes) => vec![TransportEvent::SnapshotReceived(bytes)],
                Err(e) => {
                    warn!("Could not re-encode relayed snapshot: {}", e);
                    Vec::new()
                }
            },
            ServerMessage::RoomUpdated { room } => {
                let current: HashMap<Uuid, String> = room
                    .players
                    .into_iter()
                    .filter(|p| p.connected && p.id != self.me)
                    .map(|p| (p.id, p.name))
                    .collect();

                let mut events = Vec::new();
                for (id, name) in &self.known {
                    if !current.contains_key(id) {
                        events.push(TransportEvent::PeerLeft(PeerInfo {
                            id: *id,
                            name: name.clone(),
                        }));
                    }
                }
                for (id, name) in &current {
                    if !self.known.contains_key(id) {
                        events.push(TransportEvent::PeerJoined(PeerInfo {
                            id: *id,
                            name: name.clone(),
                        }));
                    }
                }
                self.known = current;
                events
            }
            ServerMessage::Error { message } => {
                warn!("Relay rejected a message: {}", message);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

    fn room_with(players: Vec<PlayerInfo>) -> ServerMessage {
        ServerMessage::RoomUpdated {
            room: RoomInfo {
                id: Uuid::new_v4(),
                name: "Table".into(),
                host_id: players[0].id,
                players,
                max_players: 4,
                status: RoomStatus::InGame,
            },
        }
    }

    fn info(id: Uuid, name: &str, connected: bool) -> PlayerInfo {
        PlayerInfo {
            id,
            name: name.into(),
            connected,
            seat: None,
        }
    }

    #[test]
    fn test_roster_diff() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut tracker = RosterTracker::new(me);

        let events = tracker.translate(room_with(vec![info(me, "Me", true), info(other, "Ali", true)]));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TransportEvent::PeerJoined(p) if p.id == other));

        // Same roster again is quiet
        let events = tracker.translate(room_with(vec![info(me, "Me", true), info(other, "Ali", true)]));
        assert!(events.is_empty());

        // Dropped connection counts as leaving
        let events = tracker.translate(room_with(vec![info(me, "Me", true), info(other, "Ali", false)]));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TransportEvent::PeerLeft(p) if p.name == "Ali"));
    }

    #[test]
    fn test_snapshot_translation() {
        let mut tracker = RosterTracker::new(Uuid::new_v4());
        let events = tracker.translate(ServerMessage::Snapshot {
            from_seat: 0,
            state: serde_json::json!({"per": 2}),
        });
        match events.as_slice() {
            [TransportEvent::SnapshotReceived(bytes)] => {
                let value: serde_json::Value = serde_json::from_slice(bytes).unwrap();
                assert_eq!(value["per"], 2);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        assert!(tracker.translate(ServerMessage::Pong).is_empty());
    }

    #[test]
    fn test_transport_requires_open() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = RelayTransport {
            outgoing: tx,
            open: false,
        };

        assert!(matches!(transport.broadcast(b"{}".to_vec()), Err(TransportError::Closed)));

        transport.open().unwrap();
        transport.broadcast(b"{\"per\":1}".to_vec()).unwrap();
        assert!(matches!(rx.try_recv(), Ok(ClientMessage::Snapshot { .. })));

        assert!(transport.broadcast(b"not json".to_vec()).is_err());

        transport.close();
        assert!(matches!(rx.try_recv(), Ok(ClientMessage::LeaveRoom)));
        assert!(matches!(transport.broadcast(b"{}".to_vec()), Err(TransportError::Closed)));
    }
}
