// src/core/protocol/channel.rs

//! The transport-agnostic duplex channel a connection handler is handed.
//!
//! A transport adapter (WebSocket, in-memory) turns its native message type into
//! a sink of outgoing `Envelope`s and a stream of decoded incoming ones. The core
//! never sees the transport itself.

use super::envelope::Envelope;
use crate::core::SpinelRelayError;
use futures::{Sink, Stream, sink};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// The write half of a duplex channel.
pub type EnvelopeSink = Pin<Box<dyn Sink<Envelope, Error = SpinelRelayError> + Send>>;

/// The read half of a duplex channel. Each item is one received unit, already
/// decoded. The stream ending means the peer closed the channel.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Envelope, SpinelRelayError>> + Send>>;

/// A bidirectional, message-oriented channel to exactly one client.
pub struct DuplexChannel {
    sink: EnvelopeSink,
    stream: EnvelopeStream,
}

impl DuplexChannel {
    /// Builds a channel from any envelope sink and stream.
    pub fn new<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Envelope, Error = SpinelRelayError> + Send + 'static,
        St: Stream<Item = Result<Envelope, SpinelRelayError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Splits the channel into its write and read halves.
    pub fn into_split(self) -> (EnvelopeSink, EnvelopeStream) {
        (self.sink, self.stream)
    }

    /// Creates an in-process channel together with the peer end that plays the
    /// client. Used for embedding the relay and for driving it in tests.
    pub fn in_memory() -> (DuplexChannel, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let sink = sink::unfold(
            outbound_tx,
            |tx: mpsc::UnboundedSender<Envelope>, envelope: Envelope| async move {
                tx.send(envelope)
                    .map_err(|_| SpinelRelayError::ChannelClosed)?;
                Ok::<_, SpinelRelayError>(tx)
            },
        );
        let stream = UnboundedReceiverStream::new(inbound_rx);

        let peer = MemoryPeer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        };
        (DuplexChannel::new(sink, stream), peer)
    }
}

/// The client side of an in-memory `DuplexChannel`.
#[derive(Debug)]
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Result<Envelope, SpinelRelayError>>>,
    outbound: mpsc::UnboundedReceiver<Envelope>,
}

impl MemoryPeer {
    /// Sends one envelope to the server.
    pub fn send(&self, envelope: Envelope) -> Result<(), SpinelRelayError> {
        self.push(Ok(envelope))
    }

    /// Sends raw bytes to the server, decoded exactly as a network transport would.
    /// Bytes that are not a valid envelope arrive as a decode failure.
    pub fn send_raw(&self, raw: &[u8]) -> Result<(), SpinelRelayError> {
        self.push(Envelope::from_json(raw))
    }

    /// Injects a transport-level read error.
    pub fn fail(&self, error: SpinelRelayError) -> Result<(), SpinelRelayError> {
        self.push(Err(error))
    }

    /// Closes the client-to-server direction, as a peer closing its socket would.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Waits for the next envelope from the server. `None` once the server side
    /// has released the channel.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.outbound.recv().await
    }

    /// Returns an already-delivered envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.outbound.try_recv().ok()
    }

    fn push(&self, item: Result<Envelope, SpinelRelayError>) -> Result<(), SpinelRelayError> {
        match &self.inbound {
            Some(tx) => tx.send(item).map_err(|_| SpinelRelayError::ChannelClosed),
            None => Err(SpinelRelayError::ChannelClosed),
        }
    }
}
