// src/server/connection_loop.rs

//! Serves the relay until a shutdown signal arrives or a critical task fails.

use super::context::ServerContext;
use super::routes;
use anyhow::{Result, anyhow};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// Runs the HTTP/WebSocket server and supervises the background tasks.
pub async fn run(ctx: ServerContext) -> Result<()> {
    let ServerContext {
        state,
        listener,
        shutdown_tx,
        mut background_tasks,
    } = ctx;

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let server = axum::serve(listener, routes::app(state.clone())).with_graceful_shutdown(
        async move {
            server_shutdown_rx.recv().await.ok();
        },
    );
    let mut server_task = tokio::spawn(async move { server.await });

    let mut server_finished = false;
    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = &mut server_task => {
                server_finished = true;
                match res {
                    Ok(Ok(())) => warn!("The relay server stopped unexpectedly."),
                    Ok(Err(e)) => error!("CRITICAL: Relay server failed: {}", e),
                    Err(e) => error!("CRITICAL: Relay server task panicked: {e:?}"),
                }
                break;
            }
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if shutdown_tx.send(()).is_err() {
        warn!("No task was listening for the shutdown signal.");
    }

    if !server_finished {
        match server_task.await {
            Ok(Ok(())) => info!("Relay server stopped accepting connections."),
            Ok(Err(e)) => error!("Relay server failed during shutdown: {}", e),
            Err(e) => error!("Relay server task panicked during shutdown: {e:?}"),
        }
    }

    background_tasks.shutdown().await;
    info!(
        "Shutdown complete. {} client(s) were still registered; served {} connection(s) and {} envelope(s).",
        state.registry.len().await,
        state.stats.get_total_connections(),
        state.stats.get_total_envelopes()
    );
    Ok(())
}
