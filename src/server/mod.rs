// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
pub mod routes;
mod spawner;
mod stream;
pub mod websocket;

pub use stream::{AnyStream, RelayListener};

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize server state, listener, TLS, etc.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context);

    // 3. Serve until shutdown.
    connection_loop::run(server_context).await
}
