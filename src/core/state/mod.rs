// src/core/state/mod.rs

//! Defines the central `ServerState` struct and all related state components.

mod client;
mod core;
mod registry;
mod stats;

pub use client::ClientConnection;
pub use core::ServerState;
pub use registry::{ClientMap, ConnectionRegistry};
pub use stats::StatsState;
