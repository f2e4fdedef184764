//! UDP over IPv6 with signal-based event delivery.
//!
//! This module provides the transport-layer datagram socket of a simulated
//! IPv6 node:
//! - **Udp6Socket**: The socket state machine (bind, connect, send, receive,
//!   shutdown, close, multicast, options)
//! - **Demultiplexer / InterfaceResolver**: The seams to the surrounding stack
//! - **EndpointTable / StaticInterfaces**: In-memory implementations of both
//! - **Udp6SocketFactory**: Per-node creation and teardown
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quay_net::udp6::{EndpointTable, Interface, StaticInterfaces, Udp6SocketFactory};
//!
//! let demux = Arc::new(EndpointTable::new());
//! let interfaces = Arc::new(
//!     StaticInterfaces::new()
//!         .with_interface(Interface::loopback(1))
//!         .with_interface(Interface::new(2, "eth0").address("2001:db8::1".parse()?)),
//! );
//! let factory = Udp6SocketFactory::new(1, demux.clone(), interfaces);
//!
//! let socket = factory.create_socket();
//! socket.data_available.connect(|bytes| {
//!     println!("{bytes} bytes queued");
//! });
//! socket.bind_to("[2001:db8::1]:5353".parse()?)?;
//!
//! // The stack pushes inbound traffic through the endpoint table.
//! demux.deliver(datagram);
//! let received = socket.recv_from(1500)?;
//! ```
//!
//! # Multicast Example
//!
//! ```ignore
//! let group = "ff02::fb".parse()?;
//! socket.multicast_join_group(0, group)?;
//! socket.set_ip_multicast_loop(true)?;
//! socket.send_to(b"query", SocketAddrV6::new(group, 5353, 0, 0))?;
//! ```

mod config;
mod datagram;
mod demux;
mod endpoint;
mod factory;
mod icmp;
mod interfaces;
mod queue;
mod socket;
mod state;

pub use config::{
    DEFAULT_HOP_LIMIT, DEFAULT_RECV_BUFFER_SIZE, MULTICAST_IF_DEFAULT, SocketOption,
    SocketOptionName, Udp6SocketConfig,
};
pub use datagram::{DropReason, DroppedDatagram, InboundDatagram, OutboundDatagram, ReceivedDatagram};
pub use demux::{EPHEMERAL_PORT_FIRST, EPHEMERAL_PORT_LAST, EndpointTable, TRANSMIT_BACKLOG};
pub use endpoint::{Demultiplexer, EndpointHandle, InterfaceResolver, StackMessage, Upcall};
pub use factory::Udp6SocketFactory;
pub use icmp::{
    IcmpKind, IcmpReport, TYPE_DESTINATION_UNREACHABLE, TYPE_PACKET_TOO_BIG,
    TYPE_PARAMETER_PROBLEM, TYPE_TIME_EXCEEDED, Unreachable,
};
pub use interfaces::{DEFAULT_MTU, Interface, StaticInterfaces};
pub use socket::{
    ALL_NODES_INTERFACE_LOCAL, ALL_NODES_LINK_LOCAL, HEADER_OVERHEAD, MAX_PAYLOAD, Udp6Socket,
    is_broadcast_class,
};
pub use state::{Shutdown, SocketState};
