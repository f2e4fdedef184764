//! In-memory endpoint table implementing [`Demultiplexer`].
//!
//! [`EndpointTable`] keeps every allocated endpoint in a slot map, hands out
//! ephemeral ports, routes inbound datagrams and ICMPv6 errors to the owning
//! socket's [`Upcall`], and records outbound datagrams so a harness (or a
//! simulated link) can pick them up with [`EndpointTable::take_transmitted`].

use std::collections::VecDeque;
use std::net::SocketAddrV6;

use parking_lot::Mutex;
use quay_core::logging::targets;
use slotmap::SlotMap;

use super::datagram::{InboundDatagram, OutboundDatagram};
use super::endpoint::{Demultiplexer, EndpointHandle, StackMessage, Upcall};
use super::icmp::IcmpReport;
use super::socket::MAX_PAYLOAD;
use crate::Result;
use crate::error::SocketError;

/// First port of the ephemeral range (RFC 6335).
pub const EPHEMERAL_PORT_FIRST: u16 = 49152;
/// Last port of the ephemeral range.
pub const EPHEMERAL_PORT_LAST: u16 = 65535;

/// Most sent datagrams an [`EndpointTable`] holds before dropping the oldest.
pub const TRANSMIT_BACKLOG: usize = 1024;

struct Endpoint {
    local: SocketAddrV6,
    peer: Option<SocketAddrV6>,
    interface: Option<u32>,
    upcall: Upcall,
}

impl Endpoint {
    /// How well this endpoint matches a (local, remote, interface) triple.
    ///
    /// `None` when it doesn't match at all. Higher is more specific.
    fn score(&self, local: &SocketAddrV6, remote: &SocketAddrV6, interface: Option<u32>) -> Option<u8> {
        if self.local.port() != local.port() {
            return None;
        }
        let mut score = 0;
        if !self.local.ip().is_unspecified() {
            if self.local.ip() != local.ip() {
                return None;
            }
            score += 1;
        }
        if let Some(peer) = self.peer {
            if peer != *remote {
                return None;
            }
            score += 2;
        }
        if let Some(bound) = self.interface {
            if interface.is_some_and(|i| i != bound) {
                return None;
            }
            score += 1;
        }
        Some(score)
    }

    fn conflicts_with(&self, local: &SocketAddrV6) -> bool {
        self.local.port() == local.port()
            && (self.local.ip().is_unspecified()
                || local.ip().is_unspecified()
                || self.local.ip() == local.ip())
    }
}

struct EndpointTableInner {
    endpoints: SlotMap<EndpointHandle, Endpoint>,
    next_ephemeral: u16,
    transmitted: VecDeque<OutboundDatagram>,
}

impl EndpointTableInner {
    fn port_taken(&self, local: &SocketAddrV6) -> bool {
        self.endpoints.values().any(|e| e.conflicts_with(local))
    }

    fn ephemeral_port(&mut self, local: &SocketAddrV6) -> Option<u16> {
        let range = usize::from(EPHEMERAL_PORT_LAST - EPHEMERAL_PORT_FIRST) + 1;
        for _ in 0..range {
            let candidate = self.next_ephemeral;
            self.next_ephemeral = if candidate == EPHEMERAL_PORT_LAST {
                EPHEMERAL_PORT_FIRST
            } else {
                candidate + 1
            };
            let addr = SocketAddrV6::new(*local.ip(), candidate, 0, local.scope_id());
            if !self.port_taken(&addr) {
                return Some(candidate);
            }
        }
        None
    }

    /// Upcalls that should see traffic for `local` from `remote`.
    ///
    /// Multicast destinations fan out to every match; unicast goes to the
    /// most specific endpoint only.
    fn targets(&self, local: &SocketAddrV6, remote: &SocketAddrV6, interface: Option<u32>) -> Vec<Upcall> {
        let matches = self
            .endpoints
            .values()
            .filter_map(|e| e.score(local, remote, interface).map(|s| (s, e)));

        if local.ip().is_multicast() {
            return matches.map(|(_, e)| e.upcall.clone()).collect();
        }

        let mut best: Option<(u8, &Endpoint)> = None;
        for (score, endpoint) in matches {
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, endpoint));
            }
        }
        best.map(|(_, e)| vec![e.upcall.clone()]).unwrap_or_default()
    }
}

/// Reference [`Demultiplexer`] backed by a slot map.
///
/// Sent datagrams are kept until [`take_transmitted`](Self::take_transmitted)
/// drains them. The backlog is capped at [`TRANSMIT_BACKLOG`] datagrams; past
/// that the oldest one is discarded.
pub struct EndpointTable {
    inner: Mutex<EndpointTableInner>,
    tx_capacity: usize,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EndpointTableInner {
                endpoints: SlotMap::with_key(),
                next_ephemeral: EPHEMERAL_PORT_FIRST,
                transmitted: VecDeque::new(),
            }),
            tx_capacity: MAX_PAYLOAD,
        }
    }

    /// Limit the payload a single send may carry.
    pub fn with_tx_capacity(mut self, bytes: usize) -> Self {
        self.tx_capacity = bytes;
        self
    }

    /// Number of allocated endpoints.
    pub fn len(&self) -> usize {
        self.inner.lock().endpoints.len()
    }

    /// Whether no endpoint is allocated.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().endpoints.is_empty()
    }

    /// Whether `handle` still refers to an allocated endpoint.
    pub fn contains(&self, handle: EndpointHandle) -> bool {
        self.inner.lock().endpoints.contains_key(handle)
    }

    /// Local address of an endpoint.
    pub fn local_addr(&self, handle: EndpointHandle) -> Option<SocketAddrV6> {
        self.inner.lock().endpoints.get(handle).map(|e| e.local)
    }

    /// Hand an inbound datagram to the matching socket(s).
    ///
    /// Returns how many sockets received it.
    pub fn deliver(&self, datagram: InboundDatagram) -> usize {
        let upcalls = self
            .inner
            .lock()
            .targets(&datagram.destination, &datagram.source, datagram.interface);

        if upcalls.is_empty() {
            tracing::debug!(
                target: targets::DEMUX,
                destination = %datagram.destination,
                source = %datagram.source,
                "no endpoint for datagram"
            );
            return 0;
        }

        let delivered = upcalls
            .iter()
            .filter(|upcall| upcall.deliver(StackMessage::DataArrived(datagram.clone())))
            .count();
        tracing::trace!(target: targets::DEMUX, destination = %datagram.destination, delivered, "datagram demultiplexed");
        delivered
    }

    /// Route an ICMPv6 error about traffic sent from `local` to `remote`.
    ///
    /// Returns how many sockets received it.
    pub fn deliver_icmp(&self, local: SocketAddrV6, remote: SocketAddrV6, report: IcmpReport) -> usize {
        let upcalls = self.inner.lock().targets(&local, &remote, None);
        upcalls
            .iter()
            .filter(|upcall| upcall.deliver(StackMessage::IcmpError(report)))
            .count()
    }

    /// Drain the datagrams sent so far, oldest first.
    pub fn take_transmitted(&self) -> Vec<OutboundDatagram> {
        self.inner.lock().transmitted.drain(..).collect()
    }
}

impl Demultiplexer for EndpointTable {
    fn allocate(&self, local: SocketAddrV6, upcall: Upcall) -> Result<(EndpointHandle, SocketAddrV6)> {
        let mut inner = self.inner.lock();

        let port = if local.port() == 0 {
            inner.ephemeral_port(&local).ok_or(SocketError::AddressInUse)?
        } else if inner.port_taken(&local) {
            tracing::debug!(target: targets::DEMUX, %local, "address in use");
            return Err(SocketError::AddressInUse);
        } else {
            local.port()
        };

        let assigned = SocketAddrV6::new(*local.ip(), port, 0, local.scope_id());
        let handle = inner.endpoints.insert(Endpoint {
            local: assigned,
            peer: None,
            interface: None,
            upcall,
        });
        tracing::debug!(target: targets::DEMUX, local = %assigned, "endpoint allocated");
        Ok((handle, assigned))
    }

    fn release(&self, handle: EndpointHandle) -> bool {
        let released = self.inner.lock().endpoints.remove(handle);
        if let Some(endpoint) = &released {
            tracing::debug!(target: targets::DEMUX, local = %endpoint.local, "endpoint released");
        }
        released.is_some()
    }

    fn set_peer(&self, handle: EndpointHandle, peer: SocketAddrV6) -> Result<()> {
        let mut inner = self.inner.lock();
        let endpoint = inner.endpoints.get_mut(handle).ok_or(SocketError::InvalidState)?;
        endpoint.peer = Some(peer);
        Ok(())
    }

    fn bind_to_interface(&self, handle: EndpointHandle, index: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        let endpoint = inner.endpoints.get_mut(handle).ok_or(SocketError::InvalidState)?;
        endpoint.interface = Some(index);
        Ok(())
    }

    fn send(&self, handle: EndpointHandle, datagram: OutboundDatagram) -> Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.endpoints.contains_key(handle) {
            return Err(SocketError::InvalidState);
        }
        let len = datagram.payload.len();
        if len > self.tx_capacity {
            return Err(SocketError::MessageTooLong);
        }
        tracing::trace!(
            target: targets::DEMUX,
            source = %datagram.source,
            destination = %datagram.destination,
            len,
            "datagram transmitted"
        );
        if inner.transmitted.len() == TRANSMIT_BACKLOG
            && let Some(evicted) = inner.transmitted.pop_front()
        {
            tracing::debug!(target: targets::DEMUX, destination = %evicted.destination, "transmit backlog full, oldest datagram discarded");
        }
        inner.transmitted.push_back(datagram);
        Ok(len)
    }

    fn tx_available(&self, handle: EndpointHandle) -> usize {
        if self.contains(handle) { self.tx_capacity } else { 0 }
    }
}

impl std::fmt::Debug for EndpointTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EndpointTable")
            .field("endpoints", &inner.endpoints.len())
            .field("next_ephemeral", &inner.next_ephemeral)
            .field("transmitted", &inner.transmitted.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(EndpointTable: Send, Sync);
