//! Server configuration from the environment.

use anyhow::Context;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_ROOMS: usize = 256;

/// Relay settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`SERVER_ADDR`)
    pub addr: SocketAddr,
    /// Rooms allowed at once (`OKEY_MAX_ROOMS`)
    pub max_rooms: usize,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let max_rooms = match lookup("OKEY_MAX_ROOMS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("OKEY_MAX_ROOMS is not a number: {}", raw))?,
            None => DEFAULT_MAX_ROOMS,
        };

        Ok(Self { addr, max_rooms })
    }
}
