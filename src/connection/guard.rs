// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::metrics;
use crate::core::protocol::Envelope;
use crate::core::router::MessageRouter;
use crate::core::state::ClientConnection;
use std::sync::Arc;
use tracing::{debug, warn};

/// The release obligation acquired when a connection enters the registry.
///
/// Releasing unregisters the id, broadcasts the leave notice and closes the
/// transport, in that order. It runs exactly once: through `release` on the
/// handler's normal exit paths, or from `Drop` if the handler task is cancelled
/// or panics first.
pub struct ConnectionGuard {
    cleanup: Option<Cleanup>,
}

struct Cleanup {
    router: MessageRouter,
    connection: Arc<ClientConnection>,
}

impl Cleanup {
    async fn run(self) {
        let id = self.connection.id();
        let session_id = self.connection.session_id();
        debug!(
            "ConnectionGuard releasing, cleaning up resources for {} (session {}, connected for {:?})",
            id,
            session_id,
            self.connection.connected_at().elapsed()
        );

        self.router.registry().unregister(id).await;
        metrics::CONNECTED_CLIENTS.dec();
        metrics::REGISTRY_ENTRIES.set(self.router.registry().len().await as f64);

        self.router
            .broadcast(&Envelope::user_disconnected(id))
            .await;

        if let Err(e) = self.connection.close().await {
            debug!("Transport for {} (session {}) was already closed: {}", id, session_id, e);
        }
    }
}

impl ConnectionGuard {
    /// Creates a new `ConnectionGuard` for a connection that was just registered.
    pub(crate) fn new(router: MessageRouter, connection: Arc<ClientConnection>) -> Self {
        Self {
            cleanup: Some(Cleanup { router, connection }),
        }
    }

    /// Performs the cleanup and waits for it to finish.
    pub async fn release(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.run().await;
        }
    }
}

impl Drop for ConnectionGuard {
    /// Falls back to running the cleanup on a detached task when the guard is
    /// dropped without having been released.
    fn drop(&mut self) {
        let Some(cleanup) = self.cleanup.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(
                    "ConnectionGuard for {} dropped without release, cleaning up in the background.",
                    cleanup.connection.id()
                );
                handle.spawn(cleanup.run());
            }
            Err(_) => {
                warn!(
                    "ConnectionGuard for {} dropped outside a runtime; registry entry left behind.",
                    cleanup.connection.id()
                );
            }
        }
    }
}
