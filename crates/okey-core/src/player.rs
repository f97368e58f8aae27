//! Player state.
//!
//! Players are owned by [`GameBoard`](crate::board::GameBoard) and only
//! mutated through its seat-indexed methods.

use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seat index of a player (0-based, turn order)
pub type Seat = usize;

/// A single player's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Stable identity for the whole session
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Tiles in hand, in display order
    pub rack: Vec<Tile>,
    /// Points credited to this player
    pub score: u32,
}

impl Player {
    /// Create a new player with an empty rack
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            rack: Vec::new(),
            score: 0,
        }
    }

    pub(crate) fn add_tile(&mut self, tile: Tile) {
        self.rack.push(tile);
    }

    /// Remove the first rack entry equal to `tile`. Returns the removed
    /// instance, or `None` when no entry matches.
    pub(crate) fn remove_tile(&mut self, tile: &Tile) -> Option<Tile> {
        let pos = self.rack.iter().position(|t| t == tile)?;
        Some(self.rack.remove(pos))
    }

    pub(crate) fn update_score(&mut self, points: u32) {
        self.score += points;
    }

    /// Whether every tile in `tiles` can be matched one-for-one in the rack
    pub fn holds_all(&self, tiles: &[Tile]) -> bool {
        let mut available: Vec<&Tile> = self.rack.iter().collect();
        tiles.iter().all(|wanted| {
            match available.iter().position(|t| *t == wanted) {
                Some(pos) => {
                    available.swap_remove(pos);
                    true
                }
                None => false,
            }
        })
    }

    /// Whether the rack is empty (the player went out)
    pub fn has_emptied_rack(&self) -> bool {
        self.rack.is_empty()
    }
}
