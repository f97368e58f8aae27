//! Okey relay server library.
//!
//! Rooms of 2-4 players, a shared deal seed, and ordered snapshot relay
//! between seats. The relay never runs game rules; the [`client`] module
//! plugs a connection into an `okey_core` session.

pub mod client;
pub mod config;
pub mod protocol;
pub mod room;
pub mod server;

pub use client::{GameStart, RelayConnection, RelayTransport};
pub use config::ServerConfig;
pub use server::{run_server, serve, ServerState};
