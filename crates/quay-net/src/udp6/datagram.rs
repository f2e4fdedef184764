//! Datagram types exchanged between the socket, the stack and the application.

use std::net::SocketAddrV6;

/// A fully reassembled datagram handed up by the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundDatagram {
    /// The datagram payload.
    pub payload: Vec<u8>,
    /// Sender address and port.
    pub source: SocketAddrV6,
    /// Local address and port the datagram was sent to.
    pub destination: SocketAddrV6,
    /// Index of the interface the datagram arrived on, if known.
    pub interface: Option<u32>,
}

impl InboundDatagram {
    /// Create a new inbound datagram with no interface information.
    pub fn new(payload: impl Into<Vec<u8>>, source: SocketAddrV6, destination: SocketAddrV6) -> Self {
        Self {
            payload: payload.into(),
            source,
            destination,
            interface: None,
        }
    }

    /// Tag the datagram with its incoming interface.
    pub fn on_interface(mut self, index: u32) -> Self {
        self.interface = Some(index);
        self
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A datagram handed down to the endpoint for transmission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundDatagram {
    /// The datagram payload.
    pub payload: Vec<u8>,
    /// Source address and port.
    pub source: SocketAddrV6,
    /// Destination address and port.
    pub destination: SocketAddrV6,
    /// Hop limit to stamp in the IPv6 header.
    pub hop_limit: u8,
    /// Egress interface, when the socket selected one.
    pub interface: Option<u32>,
    /// For multicast destinations, loop the datagram back to local members.
    pub multicast_loop: bool,
}

/// A datagram returned to the application by `recv_from`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedDatagram {
    /// The payload, truncated to the requested size.
    pub data: Vec<u8>,
    /// Sender address and port.
    pub source: SocketAddrV6,
    /// Index of the interface the datagram arrived on, if known.
    pub interface: Option<u32>,
    /// Bytes beyond the requested size were discarded.
    pub truncated: bool,
}

/// Why an inbound datagram was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Admission would have exceeded the receive buffer size.
    BufferFull,
    /// Receiving was shut down.
    RecvShutdown,
    /// The socket was closed.
    Closed,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferFull => write!(f, "receive buffer full"),
            Self::RecvShutdown => write!(f, "receive shut down"),
            Self::Closed => write!(f, "socket closed"),
        }
    }
}

/// Payload of the `packet_dropped` signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedDatagram {
    /// The discarded datagram.
    pub datagram: InboundDatagram,
    /// Why it was discarded.
    pub reason: DropReason,
}
