// src/core/state/client.rs

//! Contains the per-connection handle shared between a handler and the registry.

use crate::core::SpinelRelayError;
use crate::core::protocol::{Envelope, EnvelopeSink};
use futures::SinkExt;
use std::fmt;
use std::time::Instant;
use tokio::sync::Mutex;

/// One live client session as seen by the rest of the server.
///
/// The handler task owns the read half of the channel. This struct owns only the
/// write half, behind a mutex so that writes from several routing tasks to the
/// same recipient are serialized.
pub struct ClientConnection {
    id: String,
    display_name: Option<String>,
    session_id: u64,
    connected_at: Instant,
    sink: Mutex<EnvelopeSink>,
}

impl ClientConnection {
    pub fn new(
        id: String,
        display_name: Option<String>,
        session_id: u64,
        sink: EnvelopeSink,
    ) -> Self {
        Self {
            id,
            display_name,
            session_id,
            connected_at: Instant::now(),
            sink: Mutex::new(sink),
        }
    }

    /// The id this connection is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// The server-assigned session number. Unlike `id`, it is unique per process.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Writes one envelope to the client. Waits for as long as the transport
    /// needs; there is no write timeout.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SpinelRelayError> {
        let mut sink = self.sink.lock().await;
        sink.send(envelope.clone()).await
    }

    /// Flushes and closes the write half of the transport.
    pub async fn close(&self) -> Result<(), SpinelRelayError> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("session_id", &self.session_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}
