//! Tiles and the standard Okey tile set.
//!
//! This module contains:
//! - Tile colors
//! - The `Tile` value type with value-based equality
//! - Construction of the 106-tile standard set
//! - Okey derivation from an indicator tile

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Highest face number on a regular tile
pub const MAX_NUMBER: u8 = 13;

/// Physical copies of every (number, color) face
pub const COPIES_PER_FACE: usize = 2;

/// Jokers in the standard set
pub const JOKER_COUNT: usize = 2;

/// Size of the standard set before the okey copy is added
pub const STANDARD_SET_SIZE: usize =
    TileColor::ALL.len() * MAX_NUMBER as usize * COPIES_PER_FACE + JOKER_COUNT;

/// Tile colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileColor {
    Red,
    Blue,
    Black,
    Yellow,
}

impl TileColor {
    /// All colors, in deal-construction order
    pub const ALL: [TileColor; 4] = [
        TileColor::Red,
        TileColor::Blue,
        TileColor::Black,
        TileColor::Yellow,
    ];
}

impl fmt::Display for TileColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileColor::Red => "red",
            TileColor::Blue => "blue",
            TileColor::Black => "black",
            TileColor::Yellow => "yellow",
        };
        f.write_str(name)
    }
}

/// Identifies one physical tile instance across renders.
///
/// Never part of equality and never sent over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

/// A single tile.
///
/// Two tiles are equal when their faces match: `(number, color, is_joker)`.
/// The `id` only tells physical copies apart for the UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    #[serde(skip)]
    pub id: TileId,
    pub number: u8,
    pub color: TileColor,
    pub is_joker: bool,
}

impl Tile {
    /// Create a regular face tile
    pub fn new(id: TileId, number: u8, color: TileColor) -> Self {
        Self {
            id,
            number,
            color,
            is_joker: false,
        }
    }

    /// Create a joker. Its face is cosmetic and never read by the rules.
    pub fn joker(id: TileId) -> Self {
        Self {
            id,
            number: 0,
            color: TileColor::Red,
            is_joker: true,
        }
    }

    /// Build a tile from its face alone (id left at the default)
    pub fn face(number: u8, color: TileColor) -> Self {
        Self::new(TileId::default(), number, color)
    }

    /// The same face carrying a different instance id
    pub fn with_id(self, id: TileId) -> Self {
        Self { id, ..self }
    }

    /// Whether the face is something a real tile can carry
    pub fn is_well_formed(&self) -> bool {
        self.is_joker || (1..=MAX_NUMBER).contains(&self.number)
    }

    /// The okey face this tile designates when revealed as the indicator.
    ///
    /// Same color, next number, 13 wraps to 1.
    pub fn okey_for_indicator(&self) -> Tile {
        let number = if self.number >= MAX_NUMBER {
            1
        } else {
            self.number + 1
        };
        Tile::face(number, self.color)
    }

    /// The standard set: two of every face plus two jokers, ids `0..106`
    pub fn standard_set() -> Vec<Tile> {
        let mut tiles = Vec::with_capacity(STANDARD_SET_SIZE);
        let mut next_id = 0u32;
        let mut mint = || {
            let id = TileId(next_id);
            next_id += 1;
            id
        };

        for color in TileColor::ALL {
            for number in 1..=MAX_NUMBER {
                for _ in 0..COPIES_PER_FACE {
                    tiles.push(Tile::new(mint(), number, color));
                }
            }
        }

        for _ in 0..JOKER_COUNT {
            tiles.push(Tile::joker(mint()));
        }

        tiles
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.color == other.color
            && self.is_joker == other.is_joker
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.color.hash(state);
        self.is_joker.hash(state);
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_joker {
            f.write_str("joker")
        } else {
            write!(f, "{} {}", self.color, self.number)
        }
    }
}
