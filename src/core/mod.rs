// src/core/mod.rs

//! The relay core: the wire model, the connection registry and the routing logic.

pub mod errors;
pub mod listing;
pub mod metrics;
pub mod protocol;
pub mod router;
pub mod state;

pub use errors::SpinelRelayError;
pub use protocol::{Envelope, EnvelopeKind};
pub use router::{MessageRouter, RouteOutcome};
