// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::handshake::Handshake;
use crate::core::metrics;
use crate::core::protocol::{DuplexChannel, Envelope, EnvelopeStream};
use crate::core::state::{ClientConnection, ServerState};
use crate::core::SpinelRelayError;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The lifecycle phase of a connection. Phases only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// The transport is up and the handshake is being read.
    Connecting,
    /// The id is in the registry and the join notice is being broadcast.
    Registered,
    /// Envelopes are being read and routed.
    Receiving,
    /// The session ended and the release obligation is running.
    Terminating,
    /// Terminal. Nothing further happens on this connection.
    Closed,
}

/// Why the receive loop stopped.
enum Termination {
    /// The peer closed the channel.
    Closed,
    /// A received unit was not a valid envelope.
    Decode(SpinelRelayError),
    /// The transport reported a read error.
    Transport(SpinelRelayError),
}

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    channel: Option<DuplexChannel>,
    handshake: Handshake,
    state: Arc<ServerState>,
    session_id: u64,
    phase: ConnectionState,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler` for a freshly established transport.
    pub fn new(channel: DuplexChannel, handshake: Handshake, state: Arc<ServerState>) -> Self {
        let session_id = state.next_session_id();
        Self {
            channel: Some(channel),
            handshake,
            state,
            session_id,
            phase: ConnectionState::Connecting,
        }
    }

    pub fn phase(&self) -> ConnectionState {
        self.phase
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Runs the connection until it ends.
    ///
    /// Registers the client, announces it, then reads and routes envelopes in
    /// arrival order. When the peer closes the channel, a read fails or an
    /// envelope cannot be decoded, the client is unregistered, its departure is
    /// announced and the transport is released. Returns `Ok` for an ordinary
    /// close and the read or decode error otherwise; in both cases the cleanup
    /// has already completed.
    pub async fn run(&mut self) -> Result<(), SpinelRelayError> {
        let Some(channel) = self.channel.take() else {
            return Err(SpinelRelayError::Internal(format!(
                "connection handler for session {} was already run",
                self.session_id
            )));
        };
        let (sink, mut stream) = channel.into_split();
        let registry = self.state.registry.clone();
        let router = self.state.router.clone();

        // --- Connecting ---
        let (id, generated) = self.handshake.resolve_id(&registry).await;
        if generated {
            info!(
                "Session {}: no id supplied, assigned '{}'.",
                self.session_id, id
            );
        }
        let display_name = self.handshake.display_name().map(str::to_string);
        info!(
            "Client connected with ID: {} (name: {:?}, session {})",
            id, display_name, self.session_id
        );

        let connection = Arc::new(ClientConnection::new(
            id.clone(),
            display_name,
            self.session_id,
            sink,
        ));

        // --- Registered ---
        if let Some(previous) = registry.register(connection.clone()).await {
            warn!(
                "Client ID '{}' re-registered by session {}; session {} is no longer reachable.",
                id,
                self.session_id,
                previous.session_id()
            );
        }
        let guard = ConnectionGuard::new(router.clone(), connection.clone());
        self.transition(ConnectionState::Registered);
        metrics::CONNECTED_CLIENTS.inc();

        let total = registry.len().await;
        metrics::REGISTRY_ENTRIES.set(total as f64);
        info!("Total connected clients: {}", total);

        router
            .broadcast(&Envelope::new_user(&id, connection.display_name()))
            .await;

        // --- Receiving ---
        self.transition(ConnectionState::Receiving);
        let termination = Self::receive_loop(&self.state, &id, &mut stream).await;

        // --- Terminating ---
        self.transition(ConnectionState::Terminating);
        let result = match termination {
            Termination::Closed => {
                debug!("Client {} (session {}) closed the connection.", id, self.session_id);
                Ok(())
            }
            Termination::Decode(e) => {
                metrics::DECODE_FAILURES_TOTAL.inc();
                info!("Client {} disconnected: {}", id, e);
                Err(e)
            }
            Termination::Transport(e) => {
                if e.is_normal_disconnect() {
                    debug!("Client {} disconnected: {}", id, e);
                } else {
                    warn!("Connection error for client {}: {}", id, e);
                }
                Err(e)
            }
        };

        guard.release().await;
        drop(stream);

        // --- Closed ---
        self.transition(ConnectionState::Closed);
        result
    }

    /// Reads envelopes one at a time and routes each with the sender stamped.
    async fn receive_loop(
        state: &ServerState,
        id: &str,
        stream: &mut EnvelopeStream,
    ) -> Termination {
        loop {
            match stream.next().await {
                Some(Ok(mut envelope)) => {
                    envelope.stamp_sender(id);
                    debug!(
                        "Message from {} to {}: {}",
                        envelope.from, envelope.to, envelope.kind
                    );
                    state.stats.increment_total_envelopes();
                    state.router.route(envelope).await;
                }
                Some(Err(e @ SpinelRelayError::Decode(_))) => return Termination::Decode(e),
                Some(Err(e)) => return Termination::Transport(e),
                None => return Termination::Closed,
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(
            "Session {}: {:?} -> {:?}",
            self.session_id, self.phase, next
        );
        self.phase = next;
    }
}
