// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of connection handlers currently registered.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("spinelrelay_connected_clients", "Number of currently connected clients.").unwrap();
    /// The number of entries in the connection registry.
    pub static ref REGISTRY_ENTRIES: Gauge =
        register_gauge!("spinelrelay_registry_entries", "Number of ids currently present in the connection registry.").unwrap();


    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("spinelrelay_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of client envelopes handed to the router.
    pub static ref ENVELOPES_ROUTED_TOTAL: Counter =
        register_counter!("spinelrelay_envelopes_routed_total", "Total number of client envelopes routed.").unwrap();
    /// The total number of envelopes dropped because their target was not registered.
    pub static ref ROUTE_MISSES_TOTAL: Counter =
        register_counter!("spinelrelay_route_misses_total", "Total number of envelopes addressed to an unknown id.").unwrap();
    /// The total number of envelopes dropped because they carried no target.
    pub static ref UNTARGETED_DROPS_TOTAL: Counter =
        register_counter!("spinelrelay_untargeted_drops_total", "Total number of client envelopes dropped for lack of a target.").unwrap();
    /// The total number of failed writes to a recipient, direct or broadcast.
    pub static ref WRITE_FAILURES_TOTAL: Counter =
        register_counter!("spinelrelay_write_failures_total", "Total number of failed writes to a client.").unwrap();
    /// The total number of presence broadcasts performed.
    pub static ref BROADCASTS_TOTAL: Counter =
        register_counter!("spinelrelay_broadcasts_total", "Total number of broadcasts performed.").unwrap();
    /// The total number of connections terminated by an undecodable envelope.
    pub static ref DECODE_FAILURES_TOTAL: Counter =
        register_counter!("spinelrelay_decode_failures_total", "Total number of connections closed after a malformed envelope.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
