// tests/integration/websocket_test.rs

//! Integration tests over a real listener: WebSocket clients, the user listing
//! and the connection limit.

use futures::{SinkExt, StreamExt};
use spinelrelay::config::Config;
use spinelrelay::core::listing::UserListing;
use spinelrelay::core::state::ServerState;
use spinelrelay::core::{Envelope, EnvelopeKind};
use spinelrelay::server::{RelayListener, routes};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A relay served on an ephemeral port for the duration of one test.
struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_config(Config::default()).await
    }

    async fn with_config(config: Config) -> Self {
        let state = ServerState::initialize(config);
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener = RelayListener::new(tcp, None);
        assert!(!listener.is_tls());
        let addr = axum::serve::Listener::local_addr(&listener).unwrap();

        let app = routes::app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }

    async fn connect(&self, id: &str, name: &str) -> WsClient {
        let url = self.ws_url(&format!("?id={id}&name={name}"));
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let joined = next_envelope(&mut ws).await;
        assert_eq!(joined.kind, EnvelopeKind::NewUser);
        assert_eq!(joined.data, id);
        ws
    }

    async fn users(&self) -> UserListing {
        reqwest::get(format!("http://{}/users", self.addr))
            .await
            .unwrap()
            .json::<UserListing>()
            .await
            .unwrap()
    }
}

async fn send_envelope(ws: &mut WsClient, envelope: &Envelope) {
    let text = envelope.to_json().unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn next_envelope(ws: &mut WsClient) -> Envelope {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("read error");
        match frame {
            Message::Text(text) => return Envelope::from_json(text.as_bytes()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_ws_join_and_direct_message() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice", "Alice").await;
    let mut bob = server.connect("bob", "Bob").await;

    let notice = next_envelope(&mut alice).await;
    assert_eq!(notice.kind, EnvelopeKind::NewUser);
    assert_eq!(notice.data, "bob");
    assert_eq!(notice.name, "Bob");

    let mut forged = Envelope::chat("bob", "hello over the wire");
    forged.from = "mallory".to_string();
    send_envelope(&mut alice, &forged).await;

    let received = next_envelope(&mut bob).await;
    assert_eq!(received.kind, EnvelopeKind::Chat);
    assert_eq!(received.from, "alice");
    assert_eq!(received.to, "bob");
    assert_eq!(received.data, "hello over the wire");
}

#[tokio::test]
async fn test_ws_outgoing_frames_carry_all_fields() {
    let server = TestServer::start().await;
    let url = server.ws_url("?id=alice");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let frame = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(text) = frame else {
        panic!("expected a text frame, got {:?}", frame);
    };
    let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(value["type"], "new_user");
    assert_eq!(value["data"], "alice");
    assert_eq!(value["from"], "");
    assert_eq!(value["to"], "");
    assert_eq!(value["name"], "");
}

#[tokio::test]
async fn test_ws_binary_frames_are_decoded() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice", "Alice").await;
    let mut bob = server.connect("bob", "Bob").await;
    next_envelope(&mut alice).await;

    let raw = Envelope::chat("bob", "binary").to_json().unwrap();
    alice
        .send(Message::Binary(raw.into_bytes().into()))
        .await
        .unwrap();

    let received = next_envelope(&mut bob).await;
    assert_eq!(received.data, "binary");
    assert_eq!(received.from, "alice");
}

#[tokio::test]
async fn test_ws_close_broadcasts_leave() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice", "Alice").await;
    let mut bob = server.connect("bob", "Bob").await;
    next_envelope(&mut alice).await;

    bob.close(None).await.unwrap();

    let notice = next_envelope(&mut alice).await;
    assert_eq!(notice.kind, EnvelopeKind::UserDisconnected);
    assert_eq!(notice.data, "bob");
    assert!(!server.state.registry.contains("bob").await);
}

#[tokio::test]
async fn test_ws_malformed_frame_closes_connection() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice", "Alice").await;
    let mut bob = server.connect("bob", "Bob").await;
    next_envelope(&mut alice).await;

    bob.send(Message::Text("definitely not json".into()))
        .await
        .unwrap();

    let notice = next_envelope(&mut alice).await;
    assert_eq!(notice.kind, EnvelopeKind::UserDisconnected);
    assert_eq!(notice.data, "bob");

    // The relay closes its end; the client sees the stream finish.
    let tail = tokio::time::timeout(TIMEOUT, async {
        while let Some(Ok(frame)) = bob.next().await {
            if let Message::Close(_) = frame {
                break;
            }
        }
    })
    .await;
    assert!(tail.is_ok(), "bob's connection was never closed");
}

#[tokio::test]
async fn test_users_listing_is_sorted_and_omits_missing_names() {
    let server = TestServer::start().await;
    assert!(server.users().await.users.is_empty());

    let _carol = server.connect("carol", "Carol").await;
    let _alice = server.connect("alice", "Alice").await;
    let url = server.ws_url("?id=bob");
    let (mut bob, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    next_envelope(&mut bob).await;

    let listing = server.users().await;
    assert_eq!(
        listing.ids().collect::<Vec<_>>(),
        vec!["alice", "bob", "carol"]
    );
    assert_eq!(listing.users[0].name.as_deref(), Some("Alice"));
    assert_eq!(listing.users[1].name, None);

    let raw: serde_json::Value = reqwest::get(format!("http://{}/users", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(raw["users"][1].get("name").is_none());
}

#[tokio::test]
async fn test_ws_connections_beyond_max_clients_are_rejected() {
    let config = Config {
        max_clients: 1,
        ..Config::default()
    };
    let server = TestServer::with_config(config).await;
    let _alice = server.connect("alice", "Alice").await;

    let err = tokio_tungstenite::connect_async(server.ws_url("?id=bob"))
        .await
        .expect_err("second client should be rejected");
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected an HTTP rejection, got {:?}", other),
    }
    assert!(!server.state.registry.contains("bob").await);
    // Only the accepted upgrade is counted.
    assert_eq!(server.state.stats.get_total_connections(), 1);
}
