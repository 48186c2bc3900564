// src/core/protocol/mod.rs

pub mod channel;
pub mod envelope;
pub use channel::{DuplexChannel, EnvelopeSink, EnvelopeStream, MemoryPeer};
pub use envelope::{Envelope, EnvelopeKind};
