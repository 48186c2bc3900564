// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use tracing::info;

/// Spawns all background tasks into the context's JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) {
    if ctx.state.config.metrics.enabled {
        let metrics_state = ctx.state.clone();
        let shutdown_rx = ctx.shutdown_tx.subscribe();
        ctx.background_tasks
            .spawn(metrics_server::run_metrics_server(metrics_state, shutdown_rx));
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }
}
