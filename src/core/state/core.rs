// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::registry::ConnectionRegistry;
use super::stats::StatsState;
use crate::config::Config;
use crate::core::router::MessageRouter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tracing::info;

/// The central struct holding all shared, server-wide state.
///
/// It is wrapped in an `Arc` and handed to every connection handler and HTTP
/// route. The registry inside it is the only state connections share.
#[derive(Debug)]
pub struct ServerState {
    /// The server's configuration, fixed for the lifetime of the process.
    pub config: Config,
    /// The table of live connections, keyed by client id.
    pub registry: Arc<ConnectionRegistry>,
    /// Routing logic over `registry`.
    pub router: MessageRouter,
    /// Server-wide counters.
    pub stats: StatsState,
    /// Caps the number of concurrently running connection handlers at `max_clients`.
    pub connection_permits: Arc<Semaphore>,
    session_id_counter: AtomicU64,
}

impl ServerState {
    /// Creates the shared state for a server running with `config`.
    pub fn initialize(config: Config) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let connection_permits = Arc::new(Semaphore::new(config.max_clients));
        info!(
            "Server state initialized (max_clients = {}).",
            config.max_clients
        );
        Arc::new(Self {
            config,
            registry,
            router,
            stats: StatsState::new(),
            connection_permits,
            session_id_counter: AtomicU64::new(0),
        })
    }

    /// Returns a fresh, process-unique session number.
    pub fn next_session_id(&self) -> u64 {
        self.session_id_counter
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }
}
