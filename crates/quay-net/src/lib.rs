//! Transport sockets for Quay simulated network nodes.
//!
//! This crate provides the socket layer that sits between a node's network
//! stack and its applications:
//!
//! - **UDP/IPv6**: Datagram sockets with non-blocking operations, a bounded
//!   receive queue and ICMPv6 error reporting
//!
//! # UDP over IPv6
//!
//! ```ignore
//! use quay_net::udp6::Udp6SocketFactory;
//!
//! let socket = factory.create_socket();
//! socket.connect("[2001:db8::2]:9000".parse()?)?;
//! socket.send(b"ping")?;
//!
//! // Later, once the stack has delivered a reply
//! match socket.recv(1500) {
//!     Ok(data) => println!("got {} bytes", data.len()),
//!     Err(SocketError::WouldBlock) => {}
//!     Err(e) => return Err(e.into()),
//! }
//! ```
//!
//! # Signal-Based Events
//!
//! Sockets never call into the application directly. Inbound traffic is
//! announced through [`quay_core::Signal`]s:
//!
//! ```ignore
//! socket.data_available.connect(|bytes| {
//!     println!("{bytes} bytes waiting");
//! });
//!
//! socket.packet_dropped.connect(|dropped| {
//!     println!("dropped datagram: {}", dropped.reason);
//! });
//! ```
//!
//! For async code, `Udp6Socket::readable` resolves once a datagram is queued.

mod error;
pub mod socket;
pub mod udp6;

pub use error::{Result, SocketError};
pub use socket::{DatagramSocket, SocketType};
pub use udp6::{Udp6Socket, Udp6SocketConfig, Udp6SocketFactory};
