//! The game board: tile pool, dealing, racks, turn order and the pot.
//!
//! This module contains:
//! - Construction of the shuffled pool and the round-robin deal
//! - Indicator reveal and okey derivation
//! - Seat-indexed player mutators (including the wholesale setters used when
//!   a peer snapshot is applied)
//! - Board-level wrappers around the [`rules`](crate::rules) functions

use crate::player::{Player, Seat};
use crate::rules;
use crate::tile::{Tile, TileId, STANDARD_SET_SIZE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Builder;

/// Tiles dealt to every player
pub const RACK_SIZE: usize = 14;

/// Fewest players a session can hold
pub const MIN_PLAYERS: usize = 2;

/// Most players a session can hold
pub const MAX_PLAYERS: usize = 4;

/// Errors from board construction and seat-indexed mutators
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BoardError {
    #[error("A game needs 2 to 4 players, got {0}")]
    InvalidPlayerCount(usize),

    #[error("No player at seat {0}")]
    InvalidSeat(Seat),

    #[error("Expected {expected} opened flags, got {actual}")]
    OpenedFlagsMismatch { expected: usize, actual: usize },
}

/// The board for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameBoard {
    /// Drawable pool; the top is the end of the vector
    tiles: Vec<Tile>,
    /// All players, indexed by seat
    players: Vec<Player>,
    /// Whose turn it is
    current_player: Seat,
    /// Revealed after the deal; determines the okey
    indicator_tile: Option<Tile>,
    /// Wild face for this session
    okey_tile: Option<Tile>,
    /// Whether each seat has made its opening play
    has_opened: Vec<bool>,
    /// Shared pot
    per: u32,
    /// Discard pile; the top is the end of the vector
    discards: Vec<Tile>,
    /// Combinations played this session, in play order
    table: Vec<Vec<Tile>>,
    /// Seed the deal was shuffled with
    seed: u64,
    /// Next id handed to a tile adopted from a snapshot
    next_tile_id: u32,
}

impl GameBoard {
    /// Create and deal a board with a random seed
    pub fn new(player_count: usize) -> Result<Self, BoardError> {
        Self::with_seed(player_count, rand::thread_rng().gen())
    }

    /// Create and deal a board whose shuffle is fully determined by `seed`
    pub fn with_seed(player_count: usize, seed: u64) -> Result<Self, BoardError> {
        let names = (1..=player_count).map(|i| format!("Player {}", i)).collect();
        Self::with_names(names, seed)
    }

    /// Create and deal a board for the given roster, in seat order
    pub fn with_names(names: Vec<String>, seed: u64) -> Result<Self, BoardError> {
        let player_count = names.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(BoardError::InvalidPlayerCount(player_count));
        }

        let mut tiles = Tile::standard_set();
        let mut rng = StdRng::seed_from_u64(seed);
        tiles.shuffle(&mut rng);

        // Ids come from the same stream so seeded peers agree on them
        let players = names
            .into_iter()
            .map(|name| Player::new(Builder::from_random_bytes(rng.gen()).into_uuid(), name))
            .collect();

        let mut board = Self {
            tiles,
            players,
            current_player: 0,
            indicator_tile: None,
            okey_tile: None,
            has_opened: vec![false; player_count],
            per: 0,
            discards: Vec::new(),
            table: Vec::new(),
            seed,
            next_tile_id: STANDARD_SET_SIZE as u32,
        };

        board.deal();
        Ok(board)
    }

    /// Round-robin deal, then reveal the indicator and return the okey copy
    /// to the pool.
    fn deal(&mut self) {
        assert!(
            self.players.len() * RACK_SIZE < self.tiles.len(),
            "pool of {} cannot deal {} racks plus an indicator",
            self.tiles.len(),
            self.players.len()
        );

        for _ in 0..RACK_SIZE {
            for player in &mut self.players {
                if let Some(tile) = self.tiles.pop() {
                    player.add_tile(tile);
                }
            }
        }

        if let Some(indicator) = self.tiles.pop() {
            let okey = indicator.okey_for_indicator();
            let minted = okey.with_id(self.mint_id());
            self.indicator_tile = Some(indicator);
            self.okey_tile = Some(okey);
            self.tiles.push(minted);
        }
    }

    fn mint_id(&mut self) -> TileId {
        let id = TileId(self.next_tile_id);
        self.next_tile_id = self.next_tile_id.wrapping_add(1);
        id
    }

    /// Give ids to tiles that arrived without them. A tile equal to one in
    /// `previous` takes over that tile's id (one-for-one); the rest are minted.
    fn adopt(&mut self, tiles: Vec<Tile>, previous: &mut Vec<Tile>) -> Vec<Tile> {
        tiles
            .into_iter()
            .map(|tile| {
                let id = match previous.iter().position(|p| *p == tile) {
                    Some(pos) => previous.swap_remove(pos).id,
                    None => self.mint_id(),
                };
                tile.with_id(id)
            })
            .collect()
    }

    fn check_seat(&self, seat: Seat) -> Result<(), BoardError> {
        if seat < self.players.len() {
            Ok(())
        } else {
            Err(BoardError::InvalidSeat(seat))
        }
    }

    // ==================== Queries ====================

    /// Drawable pool, bottom first
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tiles left to draw
    pub fn tiles_remaining(&self) -> usize {
        self.tiles.len()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.players.get(seat)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_player_index(&self) -> Seat {
        self.current_player
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player]
    }

    pub fn indicator_tile(&self) -> Option<&Tile> {
        self.indicator_tile.as_ref()
    }

    pub fn okey_tile(&self) -> Option<&Tile> {
        self.okey_tile.as_ref()
    }

    pub fn has_opened(&self) -> &[bool] {
        &self.has_opened
    }

    pub fn seat_has_opened(&self, seat: Seat) -> bool {
        self.has_opened.get(seat).copied().unwrap_or(false)
    }

    pub fn per(&self) -> u32 {
        self.per
    }

    pub fn discards(&self) -> &[Tile] {
        &self.discards
    }

    pub fn table(&self) -> &[Vec<Tile>] {
        &self.table
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Every tile in circulation: pool, racks, discards, table and the
    /// set-aside indicator.
    pub fn tile_census(&self) -> Vec<Tile> {
        let mut all: Vec<Tile> = self.tiles.clone();
        for player in &self.players {
            all.extend(player.rack.iter().copied());
        }
        all.extend(self.discards.iter().copied());
        for meld in &self.table {
            all.extend(meld.iter().copied());
        }
        all.extend(self.indicator_tile);
        all
    }

    // ==================== Turn & Rules ====================

    /// Pop the top of the pool. `None` means the pool is exhausted.
    pub fn draw_tile(&mut self) -> Option<Tile> {
        self.tiles.pop()
    }

    /// Advance to the next seat
    pub fn next_turn(&mut self) {
        self.current_player = (self.current_player + 1) % self.players.len();
    }

    pub fn calculate_points(&self, tiles: &[Tile]) -> u32 {
        rules::calculate_points(tiles, self.okey_tile.as_ref())
    }

    pub fn is_valid_combination(&self, tiles: &[Tile]) -> bool {
        rules::is_valid_combination(tiles, self.okey_tile.as_ref())
    }

    pub fn can_open(&self, tiles: &[Tile]) -> bool {
        rules::can_open(tiles, self.okey_tile.as_ref())
    }

    pub fn mark_as_opened(&mut self, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        self.has_opened[seat] = true;
        Ok(())
    }

    /// Add points to the pot
    pub fn update_per(&mut self, points: u32) {
        self.per += points;
    }

    // ==================== Player Mutators ====================

    pub fn add_tile_to_player(&mut self, tile: Tile, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        self.players[seat].add_tile(tile);
        Ok(())
    }

    /// Remove tiles by value, one rack entry per requested tile. Returns the
    /// removed instances; requested tiles with no match are skipped.
    pub fn remove_tiles_from_player(
        &mut self,
        tiles: &[Tile],
        seat: Seat,
    ) -> Result<Vec<Tile>, BoardError> {
        self.check_seat(seat)?;
        let player = &mut self.players[seat];
        Ok(tiles.iter().filter_map(|t| player.remove_tile(t)).collect())
    }

    pub fn add_points_to_player(&mut self, points: u32, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        self.players[seat].update_score(points);
        Ok(())
    }

    pub fn push_discard(&mut self, tile: Tile) {
        self.discards.push(tile);
    }

    pub fn push_meld(&mut self, meld: Vec<Tile>) {
        self.table.push(meld);
    }

    // ==================== Wholesale Setters ====================

    pub fn update_player_rack(&mut self, rack: Vec<Tile>, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        let mut previous = std::mem::take(&mut self.players[seat].rack);
        let rack = self.adopt(rack, &mut previous);
        self.players[seat].rack = rack;
        Ok(())
    }

    pub fn set_player_score(&mut self, score: u32, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        self.players[seat].score = score;
        Ok(())
    }

    pub fn update_opened_status(&mut self, status: Vec<bool>) -> Result<(), BoardError> {
        if status.len() != self.has_opened.len() {
            return Err(BoardError::OpenedFlagsMismatch {
                expected: self.has_opened.len(),
                actual: status.len(),
            });
        }
        self.has_opened = status;
        Ok(())
    }

    pub fn set_current_player_index(&mut self, seat: Seat) -> Result<(), BoardError> {
        self.check_seat(seat)?;
        self.current_player = seat;
        Ok(())
    }

    pub fn set_per(&mut self, per: u32) {
        self.per = per;
    }

    pub fn set_discards(&mut self, discards: Vec<Tile>) {
        let mut previous = std::mem::take(&mut self.discards);
        self.discards = self.adopt(discards, &mut previous);
    }

    pub fn set_table(&mut self, table: Vec<Vec<Tile>>) {
        // Melds may be rearranged, so ids are matched across the whole table
        let mut previous: Vec<Tile> = std::mem::take(&mut self.table).into_iter().flatten().collect();
        let table = table
            .into_iter()
            .map(|meld| self.adopt(meld, &mut previous))
            .collect();
        self.table = table;
    }

    /// Drop tiles from the top of the pool until at most `remaining` are left.
    /// Peers dealt from the same seed draw from identical pools, so a peer's
    /// smaller count means the top tiles are already in someone's rack.
    pub fn truncate_pool(&mut self, remaining: usize) {
        self.tiles.truncate(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileColor;
    use std::collections::HashMap;

    fn census_counts(tiles: &[Tile]) -> HashMap<Tile, usize> {
        let mut counts = HashMap::new();
        for tile in tiles {
            *counts.entry(*tile).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_new_board_deals_fourteen_each() {
        let board = GameBoard::new(4).unwrap();
        assert_eq!(board.player_count(), 4);
        for player in board.players() {
            assert_eq!(player.rack.len(), RACK_SIZE);
        }
        // 106 - 56 dealt - 1 indicator + 1 okey copy
        assert_eq!(board.tiles_remaining(), 50);
        assert_eq!(board.has_opened(), &[false; 4]);
        assert_eq!(board.current_player_index(), 0);
        assert_eq!(board.per(), 0);
    }

    #[test]
    fn test_invalid_player_counts() {
        assert_eq!(
            GameBoard::new(1).unwrap_err(),
            BoardError::InvalidPlayerCount(1)
        );
        assert_eq!(
            GameBoard::new(5).unwrap_err(),
            BoardError::InvalidPlayerCount(5)
        );
    }

    #[test]
    fn test_okey_is_derived_and_returned_to_pool() {
        let board = GameBoard::with_seed(2, 7).unwrap();
        let indicator = *board.indicator_tile().unwrap();
        let okey = *board.okey_tile().unwrap();
        assert_eq!(okey, indicator.okey_for_indicator());
        assert_eq!(*board.tiles().last().unwrap(), okey);
    }

    #[test]
    fn test_deal_is_round_robin() {
        let seed = 99;
        let board = GameBoard::with_seed(3, seed).unwrap();

        let mut pool = Tile::standard_set();
        pool.shuffle(&mut StdRng::seed_from_u64(seed));

        // Seat 0 receives the 1st, 4th, 7th... tiles popped
        let popped: Vec<Tile> = pool.iter().rev().copied().collect();
        let seat0: Vec<TileId> = popped.iter().step_by(3).take(RACK_SIZE).map(|t| t.id).collect();
        let dealt: Vec<TileId> = board.player(0).unwrap().rack.iter().map(|t| t.id).collect();
        assert_eq!(dealt, seat0);
    }

    #[test]
    fn test_seeded_boards_match() {
        let a = GameBoard::with_seed(4, 1234).unwrap();
        let b = GameBoard::with_seed(4, 1234).unwrap();
        assert_eq!(a.tiles(), b.tiles());
        assert_eq!(a.indicator_tile(), b.indicator_tile());
        for seat in 0..4 {
            assert_eq!(a.player(seat).unwrap().rack, b.player(seat).unwrap().rack);
            assert_eq!(a.player(seat).unwrap().id, b.player(seat).unwrap().id);
        }
    }

    #[test]
    fn test_census_after_deal() {
        let board = GameBoard::new(4).unwrap();
        let census = board.tile_census();
        assert_eq!(census.len(), STANDARD_SET_SIZE + 1);

        let mut expected = Tile::standard_set();
        expected.push(*board.okey_tile().unwrap());
        assert_eq!(census_counts(&census), census_counts(&expected));
    }

    #[test]
    fn test_draw_until_empty() {
        let mut board = GameBoard::new(2).unwrap();
        let remaining = board.tiles_remaining();
        for _ in 0..remaining {
            assert!(board.draw_tile().is_some());
        }
        assert!(board.draw_tile().is_none());
    }

    #[test]
    fn test_next_turn_wraps() {
        let mut board = GameBoard::new(3).unwrap();
        board.next_turn();
        board.next_turn();
        assert_eq!(board.current_player_index(), 2);
        board.next_turn();
        assert_eq!(board.current_player_index(), 0);
    }

    #[test]
    fn test_remove_duplicate_valued_tiles() {
        let mut board = GameBoard::new(2).unwrap();
        let face = Tile::face(6, TileColor::Black);
        board
            .update_player_rack(vec![face, face, Tile::face(7, TileColor::Black)], 0)
            .unwrap();

        let removed = board.remove_tiles_from_player(&[face, face], 0).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(board.player(0).unwrap().rack, vec![Tile::face(7, TileColor::Black)]);
    }

    #[test]
    fn test_bounds_checked_mutators() {
        let mut board = GameBoard::new(2).unwrap();
        assert_eq!(board.mark_as_opened(2), Err(BoardError::InvalidSeat(2)));
        assert_eq!(board.set_current_player_index(5), Err(BoardError::InvalidSeat(5)));
        assert_eq!(board.current_player_index(), 0);

        assert_eq!(
            board.update_opened_status(vec![true]),
            Err(BoardError::OpenedFlagsMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(board.has_opened(), &[false, false]);

        board.update_opened_status(vec![false, true]).unwrap();
        assert!(board.seat_has_opened(1));
    }

    #[test]
    fn test_adopted_tiles_get_fresh_ids() {
        let mut board = GameBoard::new(2).unwrap();
        board.update_player_rack(Vec::new(), 1).unwrap();
        let face = Tile::face(3, TileColor::Red);
        board.update_player_rack(vec![face, face], 1).unwrap();
        let rack = &board.player(1).unwrap().rack;
        assert_ne!(rack[0].id, rack[1].id);
        assert!(rack[0].id.0 >= STANDARD_SET_SIZE as u32);
    }

    #[test]
    fn test_replacing_rack_keeps_known_ids() {
        let mut board = GameBoard::with_seed(2, 11).unwrap();
        let before = board.player(0).unwrap().rack.clone();

        // Same faces in a new order, stripped of ids, plus one extra joker
        let mut incoming: Vec<Tile> = before.iter().rev().map(|t| t.with_id(TileId::default())).collect();
        incoming.push(Tile::joker(TileId::default()));
        board.update_player_rack(incoming, 0).unwrap();

        let after = &board.player(0).unwrap().rack;
        assert_eq!(after.len(), RACK_SIZE + 1);
        let mut kept: Vec<u32> = after[..RACK_SIZE].iter().map(|t| t.id.0).collect();
        let mut original: Vec<u32> = before.iter().map(|t| t.id.0).collect();
        kept.sort_unstable();
        original.sort_unstable();
        assert_eq!(kept, original);
        assert!(after[RACK_SIZE].id.0 >= STANDARD_SET_SIZE as u32);
        for (tile, old) in after.iter().zip(before.iter().rev()) {
            assert_eq!(tile, old);
        }
    }

    #[test]
    fn test_replacing_table_and_discards_keeps_known_ids() {
        let mut board = GameBoard::with_seed(2, 12).unwrap();
        let meld = vec![
            Tile::new(TileId(500), 4, TileColor::Blue),
            Tile::new(TileId(501), 5, TileColor::Blue),
            Tile::new(TileId(502), 6, TileColor::Blue),
        ];
        board.push_meld(meld.clone());
        board.push_discard(Tile::new(TileId(600), 9, TileColor::Black));

        let stripped: Vec<Tile> = meld.iter().map(|t| t.with_id(TileId::default())).collect();
        board.set_table(vec![stripped]);
        board.set_discards(vec![Tile::face(9, TileColor::Black)]);

        let ids: Vec<u32> = board.table()[0].iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![500, 501, 502]);
        assert_eq!(board.discards()[0].id, TileId(600));
    }

    #[test]
    fn test_pot_and_scores() {
        let mut board = GameBoard::new(2).unwrap();
        board.update_per(30);
        board.update_per(21);
        assert_eq!(board.per(), 51);

        board.add_points_to_player(51, 1).unwrap();
        assert_eq!(board.player(1).unwrap().score, 51);
        board.set_player_score(7, 1).unwrap();
        assert_eq!(board.player(1).unwrap().score, 7);
    }
}
