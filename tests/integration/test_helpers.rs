// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use spinelrelay::config::Config;
use spinelrelay::connection::{ConnectionHandler, ConnectionState, Handshake};
use spinelrelay::core::protocol::{DuplexChannel, MemoryPeer};
use spinelrelay::core::state::ServerState;
use spinelrelay::core::{Envelope, EnvelopeKind, SpinelRelayError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How long a test waits for an envelope that is expected to arrive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// What a finished handler task reports: its final phase and the result of `run`.
pub type HandlerOutcome = (ConnectionState, Result<(), SpinelRelayError>);

/// TestContext provides a relay with no network listener. Clients are attached
/// through in-memory channels and driven by real connection handlers.
pub struct TestContext {
    pub state: Arc<ServerState>,
}

impl TestContext {
    /// Creates a new test context with default configuration
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Creates a new test context with custom configuration
    pub async fn with_config(config: Config) -> Self {
        init_tracing();
        Self {
            state: ServerState::initialize(config),
        }
    }

    /// Connects a client without waiting for it to be registered.
    pub fn spawn_client(&self, id: Option<&str>, name: Option<&str>) -> TestClient {
        let (channel, peer) = DuplexChannel::in_memory();
        let mut handler =
            ConnectionHandler::new(channel, Handshake::new(id, name), self.state.clone());
        let session_id = handler.session_id();
        let task = tokio::spawn(async move {
            let result = handler.run().await;
            (handler.phase(), result)
        });
        TestClient {
            id: id.unwrap_or_default().to_string(),
            session_id,
            peer,
            task,
        }
    }

    /// Connects a client and waits for its own join notice, which proves it is
    /// registered and every earlier client has been told about it.
    pub async fn connect(&self, id: &str, name: Option<&str>) -> TestClient {
        let mut client = self.spawn_client(Some(id), name);
        let joined = client.recv().await;
        assert_eq!(joined.kind, EnvelopeKind::NewUser);
        assert_eq!(joined.data, id, "first envelope must be the client's own join");
        client
    }

    /// Connects a client with no id and returns it along with the id it was given.
    pub async fn connect_anonymous(&self) -> TestClient {
        let mut client = self.spawn_client(None, None);
        let joined = client.recv().await;
        assert_eq!(joined.kind, EnvelopeKind::NewUser);
        client.id = joined.data;
        client
    }
}

/// One in-memory client and the task running its connection handler.
pub struct TestClient {
    pub id: String,
    pub session_id: u64,
    pub peer: MemoryPeer,
    pub task: JoinHandle<HandlerOutcome>,
}

impl TestClient {
    /// Sends an envelope to the relay.
    pub fn send(&self, envelope: Envelope) {
        self.peer.send(envelope).expect("client channel is open");
    }

    /// Sends a chat envelope addressed to `to`.
    pub fn chat(&self, to: &str, data: &str) {
        self.send(Envelope::chat(to, data));
    }

    /// Waits for the next envelope from the relay.
    pub async fn recv(&mut self) -> Envelope {
        tokio::time::timeout(RECV_TIMEOUT, self.peer.recv())
            .await
            .unwrap_or_else(|_| panic!("{} timed out waiting for an envelope", self.id))
            .unwrap_or_else(|| panic!("{} was closed by the relay", self.id))
    }

    /// Waits for the next envelope and checks it is a join notice for `id`.
    pub async fn expect_join(&mut self, id: &str) -> Envelope {
        let envelope = self.recv().await;
        assert_eq!(envelope.kind, EnvelopeKind::NewUser, "{:?}", envelope);
        assert_eq!(envelope.data, id);
        envelope
    }

    /// Waits for the next envelope and checks it is a leave notice for `id`.
    pub async fn expect_leave(&mut self, id: &str) -> Envelope {
        let envelope = self.recv().await;
        assert_eq!(envelope.kind, EnvelopeKind::UserDisconnected, "{:?}", envelope);
        assert_eq!(envelope.data, id);
        envelope
    }

    /// Asserts nothing has been delivered to this client so far.
    pub fn assert_silent(&mut self) {
        if let Some(envelope) = self.peer.try_recv() {
            panic!("{} unexpectedly received {:?}", self.id, envelope);
        }
    }

    /// Waits until the relay has released this client's channel. Fails if
    /// anything else is delivered first.
    pub async fn wait_closed(&mut self) {
        match tokio::time::timeout(RECV_TIMEOUT, self.peer.recv()).await {
            Ok(None) => {}
            Ok(Some(envelope)) => panic!("{} unexpectedly received {:?}", self.id, envelope),
            Err(_) => panic!("{} was never released", self.id),
        }
    }

    /// Closes the client side and waits for the handler to finish.
    pub async fn disconnect(mut self) -> HandlerOutcome {
        self.peer.hang_up();
        self.join().await
    }

    /// Waits for the handler task to finish.
    pub async fn join(self) -> HandlerOutcome {
        tokio::time::timeout(RECV_TIMEOUT, self.task)
            .await
            .expect("handler did not finish")
            .expect("handler task panicked")
    }
}

/// Sends a marker from `sender` to `witness` and waits for it.
///
/// A handler processes its client's envelopes in order, so once the marker
/// arrives every envelope `sender` sent before it has been fully routed.
pub async fn flush(sender: &TestClient, witness: &mut TestClient) {
    sender.chat(&witness.id, "marker");
    let marker = witness.recv().await;
    assert_eq!(marker.data, "marker", "expected the marker, got {:?}", marker);
    assert_eq!(marker.from, sender.id);
}

fn init_tracing() {
    // Initialize tracing (ignore error if already initialized)
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
