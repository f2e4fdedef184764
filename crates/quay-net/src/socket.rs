//! Address-family independent datagram socket interface.

use crate::Result;
use crate::error::SocketError;

/// Kind of transport a socket provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// Reliable byte stream.
    Stream,
    /// Reliable, ordered datagrams.
    SeqPacket,
    /// Unreliable datagrams.
    Datagram,
    /// Raw network-layer packets.
    Raw,
}

impl std::fmt::Display for SocketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketType::Stream => write!(f, "stream"),
            SocketType::SeqPacket => write!(f, "seqpacket"),
            SocketType::Datagram => write!(f, "datagram"),
            SocketType::Raw => write!(f, "raw"),
        }
    }
}

/// The operation set shared by datagram sockets of any address family.
///
/// None of the operations block. Every failure is also recorded as the
/// socket's [`last_error`](DatagramSocket::last_error).
pub trait DatagramSocket: Send + Sync {
    /// Socket address type.
    type Address;
    /// Multicast group address type.
    type Group;
    /// What `recv_from` yields: payload, source and truncation status.
    type Received;

    /// The transport kind of this socket.
    fn socket_type(&self) -> SocketType;

    /// Bind to the wildcard address and an ephemeral port.
    fn bind(&self) -> Result<Self::Address>;

    /// Bind to a specific address.
    fn bind_to(&self, addr: Self::Address) -> Result<Self::Address>;

    /// Fix the default peer.
    fn connect(&self, peer: Self::Address) -> Result<()>;

    /// Not supported for datagram sockets.
    fn listen(&self) -> Result<()>;

    /// Send to the connected peer.
    fn send(&self, data: &[u8]) -> Result<usize>;

    /// Send to an explicit destination.
    fn send_to(&self, data: &[u8], destination: Self::Address) -> Result<usize>;

    /// Dequeue one datagram's payload, truncated to `max_size`.
    fn recv(&self, max_size: usize) -> Result<Vec<u8>>;

    /// Dequeue one datagram with its source and whether it was truncated.
    fn recv_from(&self, max_size: usize) -> Result<Self::Received>;

    /// Stop sending for good.
    fn shutdown_send(&self) -> Result<()>;

    /// Stop receiving for good; later arrivals are dropped.
    fn shutdown_recv(&self) -> Result<()>;

    /// Release the endpoint and discard queued datagrams.
    fn close(&self) -> Result<()>;

    /// Join a multicast group on an interface (0 lets the stack choose).
    fn multicast_join_group(&self, interface_index: u32, group: Self::Group) -> Result<()>;

    /// Leave a group joined with the same interface index.
    fn multicast_leave_group(&self, interface_index: u32, group: Self::Group) -> Result<()>;

    /// Largest payload a send can currently carry.
    fn tx_available(&self) -> usize;

    /// Bytes queued for reception.
    fn rx_available(&self) -> usize;

    /// Allow or forbid broadcast-class destinations.
    fn set_allow_broadcast(&self, allow: bool) -> Result<()>;

    /// Whether broadcast-class destinations are allowed.
    fn allow_broadcast(&self) -> bool;

    /// The error recorded by the most recent failing operation.
    fn last_error(&self) -> Option<SocketError>;

    /// The bound local address, `None` once closed.
    fn local_addr(&self) -> Option<Self::Address>;
}
