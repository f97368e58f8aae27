//! Player intents and the events they produce.
//!
//! This module defines everything a UI can ask the controller to do and the
//! state-change events the controller emits once a change has committed.

use crate::player::Seat;
use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All intents a UI can submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Toggle a tile in the working selection
    SelectTile(Tile),
    /// Draw the top tile of the pool into the current rack
    DrawTile,
    /// Lay down the current selection as a set or run
    PlaySelectedTiles,
    /// Discard one tile from the current rack and pass the turn
    DiscardTile(Tile),
}

/// Why a session's roster changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterChange {
    Joined,
    Left,
}

/// A committed state change. Exactly one is emitted per successful intent or
/// applied snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The selection changed
    SelectionChanged { selected: Vec<Tile> },

    /// A tile moved from the pool into a rack
    TileDrawn { player: Seat, tiles_remaining: usize },

    /// The pool ran out; the session is over
    GameOver,

    /// A combination was played
    TilesPlayed {
        player: Seat,
        tiles: Vec<Tile>,
        points: u32,
        opened: bool,
        next_player: Seat,
    },

    /// A tile was discarded
    TileDiscarded {
        player: Seat,
        tile: Tile,
        next_player: Seat,
    },

    /// A peer snapshot overwrote local state
    SnapshotApplied { current_player: Seat },

    /// A participant connected or disconnected
    RosterChanged {
        peer: Uuid,
        name: String,
        change: RosterChange,
    },
}

impl GameEvent {
    /// Whether peers need a fresh snapshot after this event
    pub fn is_shared(&self) -> bool {
        !matches!(
            self,
            GameEvent::SnapshotApplied { .. } | GameEvent::RosterChanged { .. } | GameEvent::GameOver
        )
    }
}
