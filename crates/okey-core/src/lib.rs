//! Kanli Okey - a tile-rummy game engine
//!
//! This crate provides the core game logic for Kanli Okey, including:
//! - The 106-tile set and okey derivation
//! - Board construction, dealing and turn order
//! - Set/run validation with joker and okey substitution, scoring
//! - A session controller driven by UI intents
//! - Full-state snapshots for keeping peers in sync
//!
//! # Architecture
//!
//! The engine performs no I/O. Peers are reached through the [`Transport`]
//! trait; a relay server implementing it lives in the `okey-server` crate.
//! The engine can be compiled to:
//! - Native Rust for desktop clients and tests
//! - WebAssembly for browser clients (feature `wasm`)
//!
//! # Modules
//!
//! - [`tile`]: Tile values and the standard set
//! - [`player`]: Player records
//! - [`rules`]: Combination and scoring rules
//! - [`board`]: The board and its mutators
//! - [`actions`]: Intents and events
//! - [`game`]: The session controller
//! - [`snapshot`]: Peer snapshots
//! - [`transport`]: The broadcast seam and an in-memory hub
//! - [`session`]: A thread-safe controller handle

pub mod actions;
pub mod board;
pub mod game;
pub mod player;
pub mod rules;
pub mod session;
pub mod snapshot;
pub mod tile;
pub mod transport;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{GameEvent, Intent, RosterChange};
pub use board::{BoardError, GameBoard, MAX_PLAYERS, MIN_PLAYERS, RACK_SIZE};
pub use game::{GameController, GameError, Observer, SessionMode, SessionState};
pub use player::{Player, Seat};
pub use rules::OPENING_THRESHOLD;
pub use session::SessionHandle;
pub use snapshot::{MultiplayerSnapshot, PlayerState, SnapshotError};
pub use tile::{Tile, TileColor, TileId};
pub use transport::{LocalHub, LocalTransport, PeerInfo, Transport, TransportError, TransportEvent};
