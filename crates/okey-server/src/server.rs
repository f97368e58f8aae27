//! WebSocket relay and connection handling.
//!
//! Each connection gets one outgoing queue, so messages from the relay reach
//! a client in the order the relay produced them.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::GameRoom;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            config,
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn send_error(&self, player_id: Uuid, message: impl Into<String>) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }

    /// Broadcast a message to all players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        self.broadcast_filtered(room_id, None, msg);
    }

    /// Broadcast a message to all players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        self.broadcast_filtered(room_id, Some(except), msg);
    }

    fn broadcast_filtered(&self, room_id: Uuid, except: Option<Uuid>, msg: ServerMessage) {
        // Collect first so the room guard is released before sending
        let recipients: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room
                .player_order
                .iter()
                .copied()
                .filter(|id| Some(*id) != except)
                .filter(|id| room.players.get(id).map_or(false, |p| p.connected))
                .collect(),
            None => return,
        };
        for player_id in recipients {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Get list of rooms still accepting players.
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting && !r.is_full())
            .map(|r| r.to_info())
            .collect()
    }

    fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }
}

/// Bind the configured address and run the relay.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(state.config.addr).await?;
    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    info!("Okey relay listening on {}", listener.local_addr()?);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let player_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = serde_json::to_string(&ServerMessage::Welcome { player_id })?;
    ws_sender.send(Message::Text(welcome)).await?;

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Could not encode {:?}: {}", msg, e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, "Invalid message");
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            max_players,
        } => {
            if state.room_of(player_id).is_some() {
                state.send_error(player_id, "Already in a room");
                return;
            }
            if state.rooms.len() >= state.config.max_rooms {
                warn!("Room limit {} reached", state.config.max_rooms);
                state.send_error(player_id, "Server is full");
                return;
            }

            let room_id = Uuid::new_v4();
            let room = GameRoom::new(room_id, player_id, player_name, max_players);
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);
            info!("Room {} created by {}", room_id, player_id);

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            if state.room_of(player_id).is_some() {
                state.send_error(player_id, "Already in a room");
                return;
            }

            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                state.send_error(player_id, "Room not found");
                return;
            };

            match room.add_player(player_id, player_name) {
                Ok(()) => {
                    let room_info = room.to_info();
                    drop(room);
                    state.player_rooms.insert(player_id, room_id);

                    state.send_to_player(
                        player_id,
                        ServerMessage::JoinedRoom {
                            room: room_info.clone(),
                        },
                    );
                    state.broadcast_to_room_except(
                        room_id,
                        player_id,
                        ServerMessage::RoomUpdated { room: room_info },
                    );
                }
                Err(e) => {
                    drop(room);
                    state.send_error(player_id, e.to_string());
                }
            }
        }

        ClientMessage::LeaveRoom => {
            let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
                return;
            };
            vacate(player_id, room_id, state);
            state.send_to_player(player_id, ServerMessage::LeftRoom);
        }

        ClientMessage::StartGame => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };

            match room.start_game(player_id) {
                Ok(seed) => {
                    let player_names = room.player_names();
                    let seats = room.seats();
                    let room_info = room.to_info();
                    drop(room);

                    info!("Room {} dealt for {} players", room_id, seats.len());

                    for (id, seat) in seats {
                        state.send_to_player(
                            id,
                            ServerMessage::GameStarted {
                                seat,
                                player_names: player_names.clone(),
                                seed,
                            },
                        );
                    }
                    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
                }
                Err(e) => {
                    drop(room);
                    state.send_error(player_id, e.to_string());
                }
            }
        }

        ClientMessage::Snapshot { state: snapshot } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };

            match room.accept_snapshot(player_id, &snapshot) {
                Ok(from_seat) => {
                    drop(room);
                    debug!("Relaying snapshot from seat {} in room {}", from_seat, room_id);
                    state.broadcast_to_room_except(
                        room_id,
                        player_id,
                        ServerMessage::Snapshot {
                            from_seat,
                            state: snapshot,
                        },
                    );
                }
                Err(e) => {
                    drop(room);
                    warn!("Dropping snapshot from {}: {}", player_id, e);
                    state.send_error(player_id, e.to_string());
                }
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Handle player disconnect.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    if let Some((_, room_id)) = state.player_rooms.remove(&player_id) {
        vacate(player_id, room_id, state);
    }
}

/// Take a player out of their room, by leaving or by dropping.
///
/// During a game the seat is kept and only marked disconnected, so the
/// remaining seats keep relaying snapshots for the full table.
fn vacate(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return;
    };

    let closing = if room.status == RoomStatus::InGame {
        room.set_player_connected(player_id, false);
        !room.has_connected_players()
    } else {
        room.remove_player(player_id).unwrap_or(false)
    };

    if closing {
        drop(room);
        state.rooms.remove(&room_id);
        info!("Room {} closed", room_id);
    } else {
        let room_info = room.to_info();
        drop(room);
        state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    }
}
