//! Combination and scoring rules.
//!
//! Pure functions over tile collections. The only board state they read is
//! the current okey face, passed in explicitly. [`GameBoard`] wraps each of
//! them with its own okey.
//!
//! [`GameBoard`]: crate::board::GameBoard

use crate::tile::{Tile, TileColor};
use std::collections::HashSet;

/// Minimum points for a player's first play of the session
pub const OPENING_THRESHOLD: u32 = 51;

/// Points scored by a joker
pub const JOKER_POINTS: u32 = 30;

/// Points scored by a tile matching the okey face
pub const OKEY_POINTS: u32 = 20;

/// Minimum tiles in a set or run
pub const MIN_COMBINATION_SIZE: usize = 3;

/// Whether a tile acts as a wildcard: a joker, or a tile showing the okey face
pub fn is_wild(tile: &Tile, okey: Option<&Tile>) -> bool {
    tile.is_joker || okey.is_some_and(|o| o == tile)
}

/// Split a group into its regular tiles and the number of wilds
fn partition<'a>(tiles: &'a [Tile], okey: Option<&Tile>) -> (Vec<&'a Tile>, usize) {
    let regular: Vec<&Tile> = tiles.iter().filter(|t| !is_wild(t, okey)).collect();
    let wild = tiles.len() - regular.len();
    (regular, wild)
}

/// Point value of a group of tiles
pub fn calculate_points(tiles: &[Tile], okey: Option<&Tile>) -> u32 {
    tiles
        .iter()
        .map(|tile| {
            if tile.is_joker {
                JOKER_POINTS
            } else if okey.is_some_and(|o| o == tile) {
                OKEY_POINTS
            } else {
                u32::from(tile.number)
            }
        })
        .sum()
}

/// Same number, pairwise distinct colors, wilds fill the missing colors
pub fn is_set(tiles: &[Tile], okey: Option<&Tile>) -> bool {
    if tiles.len() < MIN_COMBINATION_SIZE {
        return false;
    }

    let (regular, wild) = partition(tiles, okey);

    if let Some(first) = regular.first() {
        if regular.iter().any(|t| t.number != first.number) {
            return false;
        }
    }

    let colors: HashSet<TileColor> = regular.iter().map(|t| t.color).collect();
    if colors.len() != regular.len() {
        return false;
    }

    colors.len() + wild >= MIN_COMBINATION_SIZE
}

/// Same color, consecutive numbers, wilds fill gaps. 13 does not wrap to 1.
pub fn is_run(tiles: &[Tile], okey: Option<&Tile>) -> bool {
    if tiles.len() < MIN_COMBINATION_SIZE {
        return false;
    }

    let (mut regular, wild) = partition(tiles, okey);

    if let Some(first) = regular.first() {
        if regular.iter().any(|t| t.color != first.color) {
            return false;
        }
    }

    regular.sort_by_key(|t| t.number);

    let mut remaining_wild = wild;
    for pair in regular.windows(2) {
        let (prev, next) = (pair[0].number, pair[1].number);
        if next == prev {
            return false;
        }
        let gap = usize::from(next - prev - 1);
        match remaining_wild.checked_sub(gap) {
            Some(left) => remaining_wild = left,
            None => return false,
        }
    }

    true
}

/// A set or a run
pub fn is_valid_combination(tiles: &[Tile], okey: Option<&Tile>) -> bool {
    is_set(tiles, okey) || is_run(tiles, okey)
}

/// Whether a group is worth enough to open with
pub fn can_open(tiles: &[Tile], okey: Option<&Tile>) -> bool {
    calculate_points(tiles, okey) >= OPENING_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileId;

    fn t(number: u8, color: TileColor) -> Tile {
        Tile::face(number, color)
    }

    fn joker() -> Tile {
        Tile::joker(TileId(0))
    }

    #[test]
    fn test_points() {
        let okey = t(8, TileColor::Blue);
        let tiles = [t(5, TileColor::Red), joker(), t(8, TileColor::Blue)];
        assert_eq!(calculate_points(&tiles, Some(&okey)), 5 + 30 + 20);
        assert_eq!(calculate_points(&tiles, None), 5 + 30 + 8);
        assert_eq!(calculate_points(&[], Some(&okey)), 0);
    }

    #[test]
    fn test_set_three_colors() {
        let tiles = [
            t(5, TileColor::Red),
            t(5, TileColor::Blue),
            t(5, TileColor::Black),
        ];
        assert!(is_set(&tiles, None));
        assert!(is_valid_combination(&tiles, None));
    }

    #[test]
    fn test_set_with_joker() {
        let tiles = [t(5, TileColor::Red), t(5, TileColor::Blue), joker()];
        assert!(is_set(&tiles, None));
    }

    #[test]
    fn test_set_with_okey_face() {
        let okey = t(2, TileColor::Yellow);
        let tiles = [t(9, TileColor::Red), t(9, TileColor::Black), t(2, TileColor::Yellow)];
        assert!(is_set(&tiles, Some(&okey)));
        assert!(!is_set(&tiles, None));
    }

    #[test]
    fn test_set_duplicate_color_never_valid() {
        let tiles = [t(5, TileColor::Red), t(5, TileColor::Red), joker()];
        assert!(!is_set(&tiles, None));

        let tiles = [t(5, TileColor::Red), t(5, TileColor::Red), joker(), joker()];
        assert!(!is_set(&tiles, None));
    }

    #[test]
    fn test_set_mixed_numbers() {
        let tiles = [
            t(5, TileColor::Red),
            t(6, TileColor::Blue),
            t(5, TileColor::Black),
        ];
        assert!(!is_set(&tiles, None));
    }

    #[test]
    fn test_run_plain() {
        let tiles = [t(3, TileColor::Red), t(4, TileColor::Red), t(5, TileColor::Red)];
        assert!(is_run(&tiles, None));
    }

    #[test]
    fn test_run_unordered_input() {
        let tiles = [t(5, TileColor::Red), t(3, TileColor::Red), t(4, TileColor::Red)];
        assert!(is_run(&tiles, None));
    }

    #[test]
    fn test_run_joker_fills_gap() {
        let tiles = [t(3, TileColor::Red), t(5, TileColor::Red), joker()];
        assert!(is_run(&tiles, None));
    }

    #[test]
    fn test_run_gap_too_wide() {
        let tiles = [t(3, TileColor::Red), t(6, TileColor::Red), joker()];
        assert!(!is_run(&tiles, None));
        assert!(!is_valid_combination(&tiles, None));
    }

    #[test]
    fn test_run_mixed_colors() {
        let tiles = [t(3, TileColor::Red), t(4, TileColor::Blue), t(5, TileColor::Red)];
        assert!(!is_run(&tiles, None));
    }

    #[test]
    fn test_run_does_not_wrap() {
        let tiles = [t(12, TileColor::Black), t(13, TileColor::Black), t(1, TileColor::Black)];
        assert!(!is_run(&tiles, None));
    }

    #[test]
    fn test_run_rejects_repeated_number() {
        let tiles = [t(4, TileColor::Red), t(4, TileColor::Red), t(5, TileColor::Red)];
        assert!(!is_run(&tiles, None));
    }

    #[test]
    fn test_too_small() {
        let tiles = [t(4, TileColor::Red), t(5, TileColor::Red)];
        assert!(!is_valid_combination(&tiles, None));
    }

    #[test]
    fn test_all_wild() {
        let tiles = [joker(), joker(), t(7, TileColor::Blue)];
        assert!(is_valid_combination(&tiles, Some(&t(7, TileColor::Blue))));
    }

    #[test]
    fn test_can_open_threshold() {
        let okey = t(1, TileColor::Yellow);
        // 13 + 13 + 13 = 39
        let low = [t(13, TileColor::Red), t(13, TileColor::Blue), t(13, TileColor::Black)];
        assert!(!can_open(&low, Some(&okey)));

        // 39 + 12 = 51
        let exact = [
            t(13, TileColor::Red),
            t(13, TileColor::Blue),
            t(13, TileColor::Black),
            t(12, TileColor::Yellow),
        ];
        assert!(can_open(&exact, Some(&okey)));

        // 30 + 20 + 1 = 51
        let wilds = [joker(), t(1, TileColor::Yellow), t(1, TileColor::Red)];
        assert!(can_open(&wilds, Some(&okey)));
        assert_eq!(can_open(&wilds, Some(&okey)), calculate_points(&wilds, Some(&okey)) >= 51);
    }
}
