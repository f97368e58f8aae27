//! Game room management.
//!
//! The relay never runs the rules. A room tracks who is seated where, deals
//! the shared seed, and checks that relayed snapshots are well formed.

use okey_core::{MultiplayerSnapshot, MAX_PLAYERS, MIN_PLAYERS};
use rand::Rng;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// A player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
    /// Seat at the table (0-3), assigned when the game starts
    pub seat: Option<usize>,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
            seat: None,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            connected: self.connected,
            seat: self.seat,
        }
    }
}

/// A game room that can hold 2-4 players.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Join order, which becomes seat order
    pub player_order: Vec<Uuid>,
    /// Deal seed, once started
    pub seed: Option<u64>,
    /// Snapshots relayed so far
    pub snapshots_relayed: u64,
}

impl GameRoom {
    pub fn new(id: Uuid, host_id: Uuid, host_name: String, max_players: u8) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Table", host_name),
            max_players: max_players.clamp(MIN_PLAYERS as u8, MAX_PLAYERS as u8),
            host_id,
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            seed: None,
            snapshots_relayed: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.insert(player_id, RoomPlayer::new(player_id, name));
        self.player_order.push(player_id);
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        self.players.remove(&player_id);
        self.player_order.retain(|&id| id != player_id);

        // If host left, assign new host
        if player_id == self.host_id && !self.player_order.is_empty() {
            self.host_id = self.player_order[0];
        }

        // Return true if room is now empty
        Ok(self.players.is_empty())
    }

    pub fn set_player_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.connected = connected;
        }
    }

    /// Whether anyone is still connected
    pub fn has_connected_players(&self) -> bool {
        self.players.values().any(|p| p.connected)
    }

    /// Seat players in join order and pick the deal seed
    pub fn start_game(&mut self, requester_id: Uuid) -> Result<u64, RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }

        for (seat, player_id) in self.player_order.iter().enumerate() {
            if let Some(player) = self.players.get_mut(player_id) {
                player.seat = Some(seat);
            }
        }

        let seed = rand::thread_rng().gen();
        self.seed = Some(seed);
        self.status = RoomStatus::InGame;

        Ok(seed)
    }

    /// Names in seat order
    pub fn player_names(&self) -> Vec<String> {
        self.player_order
            .iter()
            .filter_map(|id| self.players.get(id).map(|p| p.name.clone()))
            .collect()
    }

    /// `(player id, seat)` for everyone seated
    pub fn seats(&self) -> Vec<(Uuid, usize)> {
        self.player_order
            .iter()
            .filter_map(|id| self.players.get(id).and_then(|p| p.seat.map(|s| (*id, s))))
            .collect()
    }

    /// Check a snapshot from `player_id` before it is relayed. Returns the
    /// sender's seat.
    pub fn accept_snapshot(
        &mut self,
        player_id: Uuid,
        state: &serde_json::Value,
    ) -> Result<usize, RoomError> {
        if self.status != RoomStatus::InGame {
            return Err(RoomError::GameNotStarted);
        }

        let seat = self
            .players
            .get(&player_id)
            .and_then(|p| p.seat)
            .ok_or(RoomError::PlayerNotInRoom)?;

        let snapshot: MultiplayerSnapshot = serde_json::from_value(state.clone())
            .map_err(|e| RoomError::InvalidSnapshot(e.to_string()))?;
        snapshot
            .validate()
            .map_err(|e| RoomError::InvalidSnapshot(e.to_string()))?;

        if snapshot.players.len() != self.player_order.len() {
            return Err(RoomError::InvalidSnapshot(format!(
                "expected {} players, got {}",
                self.player_order.len(),
                snapshot.players.len()
            )));
        }

        self.snapshots_relayed += 1;
        Ok(seat)
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| self.players.get(id).map(|p| p.to_info()))
                .collect(),
            max_players: self.max_players,
            host_id: self.host_id,
            status: self.status,
        }
    }
}
