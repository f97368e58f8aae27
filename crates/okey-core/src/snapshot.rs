//! Full-state snapshots exchanged between peers.
//!
//! A snapshot is not a delta: applying it overwrites every field it carries,
//! so the most recently applied snapshot wins.

use crate::board::{BoardError, GameBoard};
use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors decoding or validating a received snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Snapshot carries an impossible tile: {0}")]
    InvalidTile(Tile),
}

/// One player's public record inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub rack: Vec<Tile>,
    pub score: u32,
}

/// Projection of all session-mutable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplayerSnapshot {
    pub current_player_index: usize,
    pub players: Vec<PlayerState>,
    pub selected_tiles: Vec<Tile>,
    pub per: u32,
    pub has_opened: Vec<bool>,
    /// Pool size on the sender; lets seeded peers drop tiles already drawn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles_remaining: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discards: Option<Vec<Tile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<Tile>>>,
}

impl MultiplayerSnapshot {
    /// Capture the board and a selection
    pub fn capture(board: &GameBoard, selected: &[Tile]) -> Self {
        Self {
            current_player_index: board.current_player_index(),
            players: board
                .players()
                .iter()
                .map(|p| PlayerState {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    rack: p.rack.clone(),
                    score: p.score,
                })
                .collect(),
            selected_tiles: selected.to_vec(),
            per: board.per(),
            has_opened: board.has_opened().to_vec(),
            tiles_remaining: Some(board.tiles_remaining()),
            discards: Some(board.discards().to_vec()),
            table: Some(board.table().to_vec()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate received bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn all_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.players
            .iter()
            .flat_map(|p| p.rack.iter())
            .chain(self.selected_tiles.iter())
            .chain(self.discards.iter().flatten())
            .chain(self.table.iter().flatten().flatten())
    }

    /// Reject snapshots carrying faces no real tile has
    pub fn validate(&self) -> Result<(), SnapshotError> {
        match self.all_tiles().find(|t| !t.is_well_formed()) {
            Some(tile) => Err(SnapshotError::InvalidTile(*tile)),
            None => Ok(()),
        }
    }

    /// Overwrite the board with this snapshot.
    ///
    /// Players are matched by seat; seats the board does not have are
    /// skipped. A mismatched opened-flags vector or an out-of-range current
    /// index is ignored and the rest still applies. The selection is left to
    /// the caller.
    pub fn apply_to(self, board: &mut GameBoard) {
        for (seat, state) in self.players.into_iter().enumerate() {
            if seat >= board.player_count() {
                warn!(seat, "snapshot names a seat this board does not have");
                continue;
            }
            if let Err(e) = board.update_player_rack(state.rack, seat) {
                warn!(error = %e, seat, "ignoring rack from snapshot");
            }
            if let Err(e) = board.set_player_score(state.score, seat) {
                warn!(error = %e, seat, "ignoring score from snapshot");
            }
        }

        board.set_per(self.per);

        if let Err(e) = board.update_opened_status(self.has_opened) {
            warn!(error = %e, "ignoring opened flags from snapshot");
        }

        if let Err(BoardError::InvalidSeat(seat)) =
            board.set_current_player_index(self.current_player_index)
        {
            warn!(seat, "ignoring out-of-range current player from snapshot");
        }

        if let Some(remaining) = self.tiles_remaining {
            board.truncate_pool(remaining);
        }
        if let Some(discards) = self.discards {
            board.set_discards(discards);
        }
        if let Some(table) = self.table {
            board.set_table(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{TileColor, TileId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_field_names() {
        let board = GameBoard::with_seed(2, 5).unwrap();
        let snapshot = MultiplayerSnapshot::capture(&board, &[Tile::face(3, TileColor::Red)]);
        let json = serde_json::to_value(&snapshot).unwrap();

        for key in ["currentPlayerIndex", "players", "selectedTiles", "per", "hasOpened"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        let player = &json["players"][0];
        for key in ["id", "name", "rack", "score"] {
            assert!(player.get(key).is_some(), "missing player.{}", key);
        }
        assert_eq!(
            json["selectedTiles"][0],
            serde_json::json!({"number": 3, "color": "red", "isJoker": false})
        );
    }

    #[test]
    fn test_applying_keeps_rack_ids() {
        let mut board = GameBoard::with_seed(2, 8).unwrap();
        let ids = |board: &GameBoard| -> Vec<TileId> {
            board.player(0).unwrap().rack.iter().map(|t| t.id).collect()
        };
        let before = ids(&board);

        let bytes = MultiplayerSnapshot::capture(&board, &[]).to_bytes().unwrap();
        MultiplayerSnapshot::from_bytes(&bytes).unwrap().apply_to(&mut board);

        assert_eq!(ids(&board), before);
    }

    #[test]
    fn test_minimal_snapshot_decodes() {
        let bytes = br#"{
            "currentPlayerIndex": 1,
            "players": [],
            "selectedTiles": [],
            "per": 12,
            "hasOpened": [false, true]
        }"#;
        let snapshot = MultiplayerSnapshot::from_bytes(bytes).unwrap();
        assert_eq!(snapshot.current_player_index, 1);
        assert_eq!(snapshot.tiles_remaining, None);
        assert_eq!(snapshot.discards, None);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(
            MultiplayerSnapshot::from_bytes(b"{not json"),
            Err(SnapshotError::Malformed(_))
        ));
        assert!(matches!(
            MultiplayerSnapshot::from_bytes(br#"{"per": 3}"#),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn test_impossible_tile_rejected() {
        let bytes = br#"{
            "currentPlayerIndex": 0,
            "players": [],
            "selectedTiles": [{"number": 14, "color": "blue", "isJoker": false}],
            "per": 0,
            "hasOpened": [false, false]
        }"#;
        assert!(matches!(
            MultiplayerSnapshot::from_bytes(bytes),
            Err(SnapshotError::InvalidTile(_))
        ));
    }

    #[test]
    fn test_round_trip_onto_fresh_board() {
        let mut source = GameBoard::with_seed(3, 11).unwrap();
        let drawn = source.draw_tile().unwrap();
        source.add_tile_to_player(drawn, 1).unwrap();
        source.update_per(44);
        source.add_points_to_player(44, 2).unwrap();
        source.mark_as_opened(2).unwrap();
        source.set_current_player_index(2).unwrap();

        let bytes = MultiplayerSnapshot::capture(&source, &[]).to_bytes().unwrap();
        let mut target = GameBoard::new(3).unwrap();
        MultiplayerSnapshot::from_bytes(&bytes).unwrap().apply_to(&mut target);

        for seat in 0..3 {
            let (a, b) = (source.player(seat).unwrap(), target.player(seat).unwrap());
            assert_eq!(a.rack, b.rack);
            assert_eq!(a.score, b.score);
        }
        assert_eq!(target.per(), 44);
        assert_eq!(target.has_opened(), source.has_opened());
        assert_eq!(target.current_player_index(), 2);
    }

    #[test]
    fn test_mismatched_flags_ignored() {
        let mut board = GameBoard::new(2).unwrap();
        let snapshot = MultiplayerSnapshot {
            current_player_index: 1,
            players: Vec::new(),
            selected_tiles: Vec::new(),
            per: 9,
            has_opened: vec![true, true, true],
            tiles_remaining: None,
            discards: None,
            table: None,
        };
        snapshot.apply_to(&mut board);

        assert_eq!(board.has_opened(), &[false, false]);
        assert_eq!(board.per(), 9);
        assert_eq!(board.current_player_index(), 1);
    }

    #[test]
    fn test_out_of_range_current_player_ignored() {
        let mut board = GameBoard::new(2).unwrap();
        let snapshot = MultiplayerSnapshot {
            current_player_index: 3,
            players: Vec::new(),
            selected_tiles: Vec::new(),
            per: 0,
            has_opened: vec![false, false],
            tiles_remaining: None,
            discards: None,
            table: None,
        };
        snapshot.apply_to(&mut board);
        assert_eq!(board.current_player_index(), 0);
    }
}
