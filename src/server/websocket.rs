// src/server/websocket.rs

//! Adapts an upgraded WebSocket into the core's `DuplexChannel`.

use crate::core::SpinelRelayError;
use crate::core::protocol::{DuplexChannel, Envelope};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::debug;

/// Splits `socket` into an envelope sink and an envelope stream.
///
/// Every outgoing envelope is one JSON text frame. Incoming text and binary
/// frames are both decoded as JSON envelopes. Ping and pong frames are answered
/// by the WebSocket layer and never reach the core. A close frame ends the
/// stream.
pub fn into_duplex(socket: WebSocket) -> DuplexChannel {
    let (ws_tx, mut ws_rx) = socket.split();

    let sink = ws_tx
        .sink_map_err(SpinelRelayError::from)
        .with(|envelope: Envelope| async move {
            let text = envelope.to_json()?;
            Ok::<_, SpinelRelayError>(Message::Text(text.into()))
        });

    let stream = async_stream::stream! {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => yield Envelope::from_json(text.as_bytes()),
                Ok(Message::Binary(data)) => yield Envelope::from_json(&data),
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    break;
                }
                Err(e) => {
                    yield Err(SpinelRelayError::from(e));
                    break;
                }
            }
        }
    };

    DuplexChannel::new(sink, stream)
}
