//! Collaborator interfaces between a UDP/IPv6 socket and the surrounding stack.
//!
//! A socket talks to the stack through exactly two traits:
//!
//! - [`Demultiplexer`] owns the (local, remote) endpoint table, allocates
//!   ports and carries outbound datagrams.
//! - [`InterfaceResolver`] answers addressing questions (is this address
//!   local, which source address reaches that destination, what is the MTU)
//!   and performs multicast group signalling.
//!
//! In the other direction the stack holds an [`Upcall`] per endpoint and
//! pushes [`StackMessage`]s into the socket. The upcall only holds a weak
//! reference, so a socket that has been dropped simply stops receiving.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Weak;

use slotmap::new_key_type;

use super::datagram::{InboundDatagram, OutboundDatagram};
use super::icmp::IcmpReport;
use super::socket::Udp6Socket;
use crate::Result;

new_key_type! {
    /// Arena index of an endpoint inside a [`Demultiplexer`].
    ///
    /// A handle is invalidated when the endpoint is released; using a stale
    /// handle fails instead of touching another endpoint.
    pub struct EndpointHandle;
}

/// Messages the stack pushes into a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackMessage {
    /// A datagram arrived for the socket's endpoint.
    DataArrived(InboundDatagram),
    /// An ICMPv6 error concerning the socket's traffic arrived.
    IcmpError(IcmpReport),
}

/// The stack's handle for pushing messages into one socket.
#[derive(Clone, Debug)]
pub struct Upcall {
    socket: Weak<Udp6Socket>,
}

impl Upcall {
    pub(crate) fn new(socket: Weak<Udp6Socket>) -> Self {
        Self { socket }
    }

    /// Deliver a message to the socket.
    ///
    /// Never blocks on the application. Returns `false` if the socket no
    /// longer exists.
    pub fn deliver(&self, message: StackMessage) -> bool {
        match self.socket.upgrade() {
            Some(socket) => {
                socket.handle_stack_message(message);
                true
            }
            None => false,
        }
    }

    /// Whether the socket behind this upcall still exists.
    pub fn is_alive(&self) -> bool {
        self.socket.strong_count() > 0
    }

    /// Whether two upcalls target the same socket.
    pub fn same_socket(&self, other: &Upcall) -> bool {
        Weak::ptr_eq(&self.socket, &other.socket)
    }
}

/// The transport demultiplexer a socket allocates its endpoint from.
pub trait Demultiplexer: Send + Sync {
    /// Allocate an endpoint for `local`.
    ///
    /// A port of 0 requests an ephemeral port. Returns the handle and the
    /// local address actually assigned. Fails with
    /// [`SocketError::AddressInUse`](crate::SocketError::AddressInUse) or
    /// [`SocketError::AddressUnavailable`](crate::SocketError::AddressUnavailable).
    fn allocate(&self, local: SocketAddrV6, upcall: Upcall) -> Result<(EndpointHandle, SocketAddrV6)>;

    /// Release an endpoint. Returns `false` if the handle was already invalid.
    fn release(&self, handle: EndpointHandle) -> bool;

    /// Fix the remote half of the endpoint's four-tuple.
    fn set_peer(&self, handle: EndpointHandle, peer: SocketAddrV6) -> Result<()>;

    /// Restrict the endpoint to one interface.
    fn bind_to_interface(&self, handle: EndpointHandle, index: u32) -> Result<()>;

    /// Hand a datagram to the stack. Returns the number of payload bytes accepted.
    fn send(&self, handle: EndpointHandle, datagram: OutboundDatagram) -> Result<usize>;

    /// Largest payload the endpoint can currently accept for sending.
    fn tx_available(&self, handle: EndpointHandle) -> usize;
}

/// Addressing and interface queries, plus multicast group signalling.
pub trait InterfaceResolver: Send + Sync {
    /// Whether `addr` is assigned to a local interface.
    fn is_local_address(&self, addr: &Ipv6Addr) -> bool;

    /// Whether an interface with this index exists.
    fn has_interface(&self, index: u32) -> bool;

    /// Source address and egress interface for reaching `destination`.
    ///
    /// `interface` restricts the lookup to one interface. Returns `None` when
    /// there is no route.
    fn route(&self, destination: &Ipv6Addr, interface: Option<u32>) -> Option<(Ipv6Addr, u32)>;

    /// Interface used for multicast sends when the socket selected none.
    fn default_multicast_interface(&self) -> Option<u32>;

    /// Link MTU of an interface.
    fn mtu(&self, index: u32) -> Option<u32>;

    /// Signal membership of `group` on `index` (0 lets the stack choose).
    fn join_group(&self, index: u32, group: &Ipv6Addr) -> Result<()>;

    /// Withdraw membership of `group` on `index`.
    fn leave_group(&self, index: u32, group: &Ipv6Addr) -> Result<()>;
}
