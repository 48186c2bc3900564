// src/core/router.rs

//! Best-effort delivery of envelopes over the connection registry.
//!
//! The router holds no state of its own. It offers exactly two delivery paths:
//! `broadcast`, used only for the server's presence events, and `route`, the
//! single dispatch rule for envelopes read off a client connection.

use crate::core::metrics;
use crate::core::protocol::Envelope;
use crate::core::state::ConnectionRegistry;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to an envelope handed to `MessageRouter::route`.
///
/// This is for logging and tests only. The sender never learns the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Written to the target connection.
    Delivered,
    /// `to` was empty, so the envelope was dropped.
    Untargeted,
    /// `to` named an id that is not registered, so the envelope was dropped.
    TargetMissing,
    /// The target was registered but the write to it failed.
    WriteFailed,
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Writes `envelope` to every registered connection, one after another.
    ///
    /// The registry read lock is held until the last write completes, so a slow
    /// recipient delays the recipients after it and blocks registry mutations
    /// meanwhile. A failed write is logged and skipped. Returns the number of
    /// successful deliveries.
    pub async fn broadcast(&self, envelope: &Envelope) -> usize {
        let clients = self.registry.read().await;
        metrics::BROADCASTS_TOTAL.inc();

        let mut delivered = 0;
        for connection in clients.values() {
            match connection.send(envelope).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    metrics::WRITE_FAILURES_TOTAL.inc();
                    warn!(
                        "Broadcast of '{}' to {} (session {}) failed: {}",
                        envelope.kind,
                        connection.id(),
                        connection.session_id(),
                        e
                    );
                }
            }
        }
        debug!(
            "Broadcast '{}' delivered to {}/{} connections.",
            envelope.kind,
            delivered,
            clients.len()
        );
        delivered
    }

    /// Dispatches an envelope read off a client connection.
    ///
    /// A targeted envelope goes to the target only, never back to the sender. An
    /// untargeted envelope, or one whose target is not registered, is dropped
    /// without telling anyone.
    pub async fn route(&self, envelope: Envelope) -> RouteOutcome {
        metrics::ENVELOPES_ROUTED_TOTAL.inc();

        let Some(target) = envelope.target() else {
            metrics::UNTARGETED_DROPS_TOTAL.inc();
            debug!(
                "Dropping untargeted '{}' envelope from {}.",
                envelope.kind, envelope.from
            );
            return RouteOutcome::Untargeted;
        };

        let Some(connection) = self.registry.lookup(target).await else {
            metrics::ROUTE_MISSES_TOTAL.inc();
            debug!(
                "Dropping '{}' envelope from {}: no client registered as '{}'.",
                envelope.kind, envelope.from, target
            );
            return RouteOutcome::TargetMissing;
        };

        match connection.send(&envelope).await {
            Ok(()) => RouteOutcome::Delivered,
            Err(e) => {
                metrics::WRITE_FAILURES_TOTAL.inc();
                warn!(
                    "Error sending '{}' envelope from {} to {}: {}",
                    envelope.kind, envelope.from, target, e
                );
                RouteOutcome::WriteFailed
            }
        }
    }
}
