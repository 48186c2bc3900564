// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: handshake, registration,
//! the receive loop and the guaranteed cleanup when the session ends.

mod guard;
mod handler;
mod handshake;

pub use guard::ConnectionGuard;
pub use handler::{ConnectionHandler, ConnectionState};
pub use handshake::Handshake;
