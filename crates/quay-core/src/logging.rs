//! Logging facilities for Quay.
//!
//! Quay uses the `tracing` crate for instrumentation. The library never
//! installs a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("quay_net::udp6=debug")
//!     .init();
//! ```
//!
//! The constants below name the targets and spans emitted by each
//! subsystem so they can be used in filter directives.

/// Span names used throughout Quay for tracing.
pub mod span_names {
    /// Socket operation span (bind, connect, send, close).
    pub const SOCKET_OP: &str = "quay::socket_op";
    /// Inbound upcall span.
    pub const UPCALL: &str = "quay::upcall";
}

/// Target names for log filtering.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "quay_core::signal";
    /// UDP/IPv6 socket state machine target.
    pub const SOCKET: &str = "quay_net::udp6::socket";
    /// Delivery queue admission and draining.
    pub const QUEUE: &str = "quay_net::udp6::queue";
    /// Endpoint demultiplexer target.
    pub const DEMUX: &str = "quay_net::udp6::demux";
    /// ICMPv6 error handling target.
    pub const ICMP: &str = "quay_net::udp6::icmp";
    /// Interface resolution and multicast signalling.
    pub const INTERFACES: &str = "quay_net::udp6::interfaces";
}
