// src/core/errors.rs

//! Defines the primary error type for the relay core.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the relay core can observe.
///
/// None of these errors is ever sent back to a peer. They either terminate the
/// connection that produced them or are logged and discarded.
#[derive(Error, Debug)]
pub enum SpinelRelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A received unit could not be parsed into an `Envelope`.
    #[error("Malformed envelope: {0}")]
    Decode(String),

    /// An envelope could not be serialized for sending.
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    /// The underlying duplex transport reported an error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer's channel is already closed.
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl SpinelRelayError {
    /// Returns true if the error represents an ordinary end of the peer's session
    /// rather than a fault worth a warning.
    pub fn is_normal_disconnect(&self) -> bool {
        match self {
            SpinelRelayError::ChannelClosed => true,
            SpinelRelayError::Io(e) => is_normal_io_disconnect(e),
            _ => false,
        }
    }
}

fn is_normal_io_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    )
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for SpinelRelayError {
    fn clone(&self) -> Self {
        match self {
            SpinelRelayError::Io(e) => SpinelRelayError::Io(Arc::clone(e)),
            SpinelRelayError::Decode(s) => SpinelRelayError::Decode(s.clone()),
            SpinelRelayError::Encode(s) => SpinelRelayError::Encode(s.clone()),
            SpinelRelayError::Transport(s) => SpinelRelayError::Transport(s.clone()),
            SpinelRelayError::ChannelClosed => SpinelRelayError::ChannelClosed,
            SpinelRelayError::Internal(s) => SpinelRelayError::Internal(s.clone()),
        }
    }
}

impl PartialEq for SpinelRelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SpinelRelayError::Io(e1), SpinelRelayError::Io(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (SpinelRelayError::Decode(s1), SpinelRelayError::Decode(s2)) => s1 == s2,
            (SpinelRelayError::Encode(s1), SpinelRelayError::Encode(s2)) => s1 == s2,
            (SpinelRelayError::Transport(s1), SpinelRelayError::Transport(s2)) => s1 == s2,
            (SpinelRelayError::Internal(s1), SpinelRelayError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SpinelRelayError {
    fn from(e: std::io::Error) -> Self {
        SpinelRelayError::Io(Arc::new(e))
    }
}

/// WebSocket errors wrap the socket's `io::Error` a few levels down. When one is
/// found it becomes `Io`, so peer resets are classified like any other socket error.
impl From<axum::Error> for SpinelRelayError {
    fn from(e: axum::Error) -> Self {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                return std::io::Error::new(io_err.kind(), e.to_string()).into();
            }
            source = err.source();
        }
        SpinelRelayError::Transport(e.to_string())
    }
}
