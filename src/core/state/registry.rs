// src/core/state/registry.rs

//! The process-wide table of live connections, keyed by client id.

use super::client::ClientConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

pub type ClientMap = HashMap<String, Arc<ClientConnection>>;

/// `ConnectionRegistry` maps a client id to the connection registered under it.
///
/// Mutations (`register`, `unregister`) take the write lock. Reads (`lookup`,
/// `snapshot`, a broadcast in progress) share the read lock and exclude
/// mutations for as long as they hold it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: RwLock<ClientMap>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `connection` under its id, replacing any previous entry.
    ///
    /// The superseded connection, if any, is returned but not closed: its own
    /// handler still owns it and will clean up when its session ends.
    pub async fn register(
        &self,
        connection: Arc<ClientConnection>,
    ) -> Option<Arc<ClientConnection>> {
        let id = connection.id().to_string();
        let previous = self.clients.write().await.insert(id, connection);
        if let Some(prev) = &previous {
            debug!(
                "Registry entry for '{}' replaced (superseded session {}).",
                prev.id(),
                prev.session_id()
            );
        }
        previous
    }

    /// Removes the entry for `id`. Removing an absent id is a no-op.
    pub async fn unregister(&self, id: &str) -> Option<Arc<ClientConnection>> {
        self.clients.write().await.remove(id)
    }

    /// Point lookup used for direct routing.
    pub async fn lookup(&self, id: &str) -> Option<Arc<ClientConnection>> {
        self.clients.read().await.get(id).cloned()
    }

    /// All connections registered at the moment of the call, in no particular order.
    pub async fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Returns true if `id` is currently registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.clients.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// The id assigned to a client that did not supply one: `user-<registry size>`.
    ///
    /// The size is read without reserving anything, so two concurrent handshakes
    /// can receive the same id, and an id freed by a departure can be handed out
    /// while a higher-numbered client is still connected.
    pub async fn fallback_id(&self) -> String {
        format!("user-{}", self.len().await)
    }

    /// Acquires the shared read lock for the caller's whole operation.
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, ClientMap> {
        self.clients.read().await
    }
}
