//! Session orchestration.
//!
//! This module contains the `GameController`, which owns one board for one
//! session, holds the working tile selection, turns UI intents into board
//! mutations and keeps peers in sync with full snapshots.

use crate::actions::{GameEvent, Intent, RosterChange};
use crate::board::{BoardError, GameBoard};
use crate::player::{Player, Seat};
use crate::rules::OPENING_THRESHOLD;
use crate::snapshot::{MultiplayerSnapshot, SnapshotError};
use crate::tile::Tile;
use crate::transport::{PeerInfo, Transport, TransportError, TransportEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Whether the session is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Playing,
    /// A draw found the pool empty
    GameOver,
}

/// How this controller participates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Every seat is played from this controller
    Local,
    /// This controller plays one seat; peers play the rest
    Multiplayer { seat: Seat },
}

/// Errors that can occur when applying intents
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Game is over")]
    GameOver,

    #[error("Select some tiles first")]
    EmptySelection,

    #[error("First play must be at least {required} points, selection is worth {points}")]
    InsufficientOpeningPoints { points: u32, required: u32 },

    #[error("Invalid combination")]
    InvalidCombination,

    #[error("That tile is not in your rack")]
    TileNotInRack,

    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Receives every committed [`GameEvent`]
pub type Observer = Box<dyn FnMut(&GameEvent) + Send>;

/// One play session
pub struct GameController {
    board: GameBoard,
    selected: Vec<Tile>,
    state: SessionState,
    status_message: Option<String>,
    show_indicator: bool,
    mode: SessionMode,
    transport: Option<Box<dyn Transport>>,
    roster: Vec<PeerInfo>,
    observers: Vec<Observer>,
}

impl GameController {
    /// A hot-seat session over an existing board
    pub fn new(board: GameBoard) -> Self {
        Self {
            board,
            selected: Vec::new(),
            state: SessionState::Playing,
            status_message: None,
            show_indicator: false,
            mode: SessionMode::Local,
            transport: None,
            roster: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// A hot-seat session on a freshly dealt board
    pub fn local(player_count: usize) -> Result<Self, GameError> {
        Ok(Self::new(GameBoard::new(player_count)?))
    }

    /// A networked session playing `seat`. Call [`open`](Self::open) before
    /// submitting intents.
    pub fn multiplayer(
        board: GameBoard,
        seat: Seat,
        transport: Box<dyn Transport>,
    ) -> Result<Self, GameError> {
        if seat >= board.player_count() {
            return Err(BoardError::InvalidSeat(seat).into());
        }
        let mut controller = Self::new(board);
        controller.mode = SessionMode::Multiplayer { seat };
        controller.transport = Some(transport);
        Ok(controller)
    }

    /// Open the transport
    pub fn open(&mut self) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport.open(),
            None => Ok(()),
        }
    }

    /// Close the transport. The board is kept.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        self.roster.clear();
    }

    /// Register an observer for committed changes
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    // ==================== Published State ====================

    pub fn board(&self) -> &GameBoard {
        &self.board
    }

    pub fn selected_tiles(&self) -> &[Tile] {
        &self.selected
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_game_over(&self) -> bool {
        self.state == SessionState::GameOver
    }

    /// The last rule or sync failure, cleared by the next successful intent
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn local_seat(&self) -> Option<Seat> {
        match self.mode {
            SessionMode::Local => None,
            SessionMode::Multiplayer { seat } => Some(seat),
        }
    }

    pub fn is_multiplayer(&self) -> bool {
        matches!(self.mode, SessionMode::Multiplayer { .. })
    }

    pub fn current_player(&self) -> &Player {
        self.board.current_player()
    }

    pub fn current_player_has_opened(&self) -> bool {
        self.board.seat_has_opened(self.board.current_player_index())
    }

    pub fn indicator_tile(&self) -> Option<&Tile> {
        self.board.indicator_tile()
    }

    pub fn okey_tile(&self) -> Option<&Tile> {
        self.board.okey_tile()
    }

    pub fn per(&self) -> u32 {
        self.board.per()
    }

    /// Connected peers, in join order
    pub fn roster(&self) -> &[PeerInfo] {
        &self.roster
    }

    pub fn show_indicator(&self) -> bool {
        self.show_indicator
    }

    /// Reveal or hide the indicator on screen. Purely local.
    pub fn toggle_indicator(&mut self) {
        self.show_indicator = !self.show_indicator;
    }

    /// First seat whose rack is empty
    pub fn check_for_winner(&self) -> Option<&Player> {
        self.board.players().iter().find(|p| p.has_emptied_rack())
    }

    pub fn snapshot(&self) -> MultiplayerSnapshot {
        MultiplayerSnapshot::capture(&self.board, &self.selected)
    }

    // ==================== Intents ====================

    /// Dispatch an intent
    pub fn apply_intent(&mut self, intent: Intent) -> Result<GameEvent, GameError> {
        match intent {
            Intent::SelectTile(tile) => self.select_tile(tile),
            Intent::DrawTile => self.draw_tile(),
            Intent::PlaySelectedTiles => self.play_selected_tiles(),
            Intent::DiscardTile(tile) => self.discard_tile(tile),
        }
    }

    /// Toggle `tile` in the selection, by value
    pub fn select_tile(&mut self, tile: Tile) -> Result<GameEvent, GameError> {
        match self.selected.iter().position(|t| *t == tile) {
            Some(pos) => {
                self.selected.remove(pos);
            }
            None => self.selected.push(tile),
        }

        Ok(self.commit(GameEvent::SelectionChanged {
            selected: self.selected.clone(),
        }))
    }

    /// Draw into the current player's rack. An empty pool ends the session.
    pub fn draw_tile(&mut self) -> Result<GameEvent, GameError> {
        self.check_can_act()?;
        let seat = self.board.current_player_index();

        let Some(tile) = self.board.draw_tile() else {
            self.state = SessionState::GameOver;
            info!("pool exhausted, game over");
            return Ok(self.commit(GameEvent::GameOver));
        };

        self.board.add_tile_to_player(tile, seat)?;

        Ok(self.commit(GameEvent::TileDrawn {
            player: seat,
            tiles_remaining: self.board.tiles_remaining(),
        }))
    }

    /// Play the selection as one combination.
    ///
    /// Every check runs before anything is mutated, so a rejected play leaves
    /// the opened flag, the rack and the pot untouched.
    pub fn play_selected_tiles(&mut self) -> Result<GameEvent, GameError> {
        self.check_can_act()?;

        if self.selected.is_empty() {
            return self.reject(GameError::EmptySelection);
        }

        let seat = self.board.current_player_index();
        if !self.board.current_player().holds_all(&self.selected) {
            return self.reject(GameError::TileNotInRack);
        }

        let opening = !self.board.seat_has_opened(seat);
        let points = self.board.calculate_points(&self.selected);

        if opening && !self.board.can_open(&self.selected) {
            return self.reject(GameError::InsufficientOpeningPoints {
                points,
                required: OPENING_THRESHOLD,
            });
        }

        if !self.board.is_valid_combination(&self.selected) {
            return self.reject(GameError::InvalidCombination);
        }

        if opening {
            self.board.mark_as_opened(seat)?;
        }
        self.board.update_per(points);
        self.board.add_points_to_player(points, seat)?;

        let played = std::mem::take(&mut self.selected);
        let meld = self.board.remove_tiles_from_player(&played, seat)?;
        self.board.push_meld(meld);
        self.board.next_turn();

        Ok(self.commit(GameEvent::TilesPlayed {
            player: seat,
            tiles: played,
            points,
            opened: opening,
            next_player: self.board.current_player_index(),
        }))
    }

    /// Discard one tile and pass the turn
    pub fn discard_tile(&mut self, tile: Tile) -> Result<GameEvent, GameError> {
        self.check_can_act()?;
        let seat = self.board.current_player_index();

        let mut removed = self.board.remove_tiles_from_player(&[tile], seat)?;
        let Some(discarded) = removed.pop() else {
            return self.reject(GameError::TileNotInRack);
        };

        self.board.push_discard(discarded);
        self.selected.clear();
        self.board.next_turn();

        Ok(self.commit(GameEvent::TileDiscarded {
            player: seat,
            tile: discarded,
            next_player: self.board.current_player_index(),
        }))
    }

    // ==================== Synchronization ====================

    /// Broadcast the current state to every peer
    pub fn sync(&self) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };

        match self.snapshot().to_bytes() {
            Ok(bytes) => {
                if let Err(e) = transport.broadcast(bytes) {
                    warn!(error = %e, "snapshot broadcast failed");
                }
            }
            Err(e) => warn!(error = %e, "could not encode snapshot"),
        }
    }

    /// Apply snapshot bytes from a peer. A snapshot that fails to decode is
    /// dropped and local state is kept.
    pub fn receive_snapshot(&mut self, bytes: &[u8]) -> Result<GameEvent, SnapshotError> {
        let snapshot = match MultiplayerSnapshot::from_bytes(bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "dropping snapshot");
                self.status_message = Some(e.to_string());
                return Err(e);
            }
        };

        self.selected = snapshot.selected_tiles.clone();
        snapshot.apply_to(&mut self.board);

        Ok(self.commit(GameEvent::SnapshotApplied {
            current_player: self.board.current_player_index(),
        }))
    }

    /// Handle one delivery from the transport
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Option<GameEvent> {
        match event {
            TransportEvent::SnapshotReceived(bytes) => self.receive_snapshot(&bytes).ok(),
            TransportEvent::PeerJoined(peer) => {
                if self.roster.iter().any(|p| p.id == peer.id) {
                    return None;
                }
                self.roster.push(peer.clone());
                Some(self.commit(GameEvent::RosterChanged {
                    peer: peer.id,
                    name: peer.name,
                    change: RosterChange::Joined,
                }))
            }
            TransportEvent::PeerLeft(peer) => {
                let before = self.roster.len();
                self.roster.retain(|p| p.id != peer.id);
                if self.roster.len() == before {
                    return None;
                }
                Some(self.commit(GameEvent::RosterChanged {
                    peer: peer.id,
                    name: peer.name,
                    change: RosterChange::Left,
                }))
            }
        }
    }

    // ==================== Helper Methods ====================

    fn check_can_act(&mut self) -> Result<(), GameError> {
        if self.state == SessionState::GameOver {
            return self.reject(GameError::GameOver);
        }
        if let Some(seat) = self.local_seat() {
            if seat != self.board.current_player_index() {
                return self.reject(GameError::NotYourTurn);
            }
        }
        Ok(())
    }

    fn reject<T>(&mut self, error: GameError) -> Result<T, GameError> {
        debug!(%error, "intent rejected");
        self.status_message = Some(error.to_string());
        Err(error)
    }

    /// Publish a committed change: sync peers if it touched shared state,
    /// then notify observers.
    fn commit(&mut self, event: GameEvent) -> GameEvent {
        debug!(?event, "committed");
        if !matches!(event, GameEvent::SnapshotApplied { .. } | GameEvent::RosterChanged { .. }) {
            self.status_message = None;
        }
        if event.is_shared() && self.is_multiplayer() {
            self.sync();
        }
        for observer in &mut self.observers {
            observer(&event);
        }
        event
    }
}
