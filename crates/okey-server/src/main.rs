//! Okey relay server.

use okey_server::{run_server, ServerConfig, ServerState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    info!("Starting Okey relay (max {} rooms)...", config.max_rooms);

    let state = Arc::new(ServerState::new(config));

    run_server(state).await
}
