//! Lupine lobby server daemon
//!
//! Hosts the room coordination layer. Configuration comes from the
//! environment:
//!
//! - `LUPINE_PORT`: listen port (default 3070)
//! - `LUPINE_MAX_PLAYERS`: hard cap on seats per room (default 19)
//! - `RUST_LOG`: tracing filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lupine_core::DEFAULT_MAX_PLAYERS;
use lupine_net::{Server, ServerConfig, DEFAULT_PORT};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port: u16 = env_or("LUPINE_PORT", DEFAULT_PORT);
    let max_players: usize = env_or("LUPINE_MAX_PLAYERS", DEFAULT_MAX_PLAYERS);

    tracing::info!(port = port, max_players = max_players, "Starting lupine-server");

    let server = match Server::start(port, ServerConfig { max_players }).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    server.shutdown();
    tracing::info!("Bye");
}
