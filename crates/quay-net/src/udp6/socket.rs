//! UDP/IPv6 socket with signal-based event delivery.

use std::collections::HashSet;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use quay_core::Signal;
use quay_core::logging::{span_names, targets};
use tokio::sync::Notify;

use super::config::{SocketOption, SocketOptionName, Udp6SocketConfig};
use super::datagram::{
    DropReason, DroppedDatagram, InboundDatagram, OutboundDatagram, ReceivedDatagram,
};
use super::endpoint::{Demultiplexer, EndpointHandle, InterfaceResolver, StackMessage, Upcall};
use super::icmp::IcmpReport;
use super::queue::DeliveryQueue;
use super::state::{Shutdown, SocketState};
use crate::Result;
use crate::error::SocketError;
use crate::socket::{DatagramSocket, SocketType};

/// Largest UDP payload carried by a non-jumbo IPv6 packet (65535 - 8).
pub const MAX_PAYLOAD: usize = 65_527;

/// IPv6 header plus UDP header, in bytes.
pub const HEADER_OVERHEAD: usize = 48;

/// All-nodes address, interface-local scope.
pub const ALL_NODES_INTERFACE_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff01, 0, 0, 0, 0, 0, 0, 1);

/// All-nodes address, link-local scope.
pub const ALL_NODES_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

const ANY: SocketAddrV6 = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);

/// Whether `addr` is the IPv6 equivalent of a broadcast destination.
pub fn is_broadcast_class(addr: &Ipv6Addr) -> bool {
    *addr == ALL_NODES_INTERFACE_LOCAL || *addr == ALL_NODES_LINK_LOCAL
}

type IcmpCallback = Arc<dyn Fn(&IcmpReport) + Send + Sync>;

/// Internal state for the UDP/IPv6 socket.
struct Udp6SocketInner {
    state: SocketState,
    shutdown: Shutdown,
    endpoint: Option<EndpointHandle>,
    local_addr: SocketAddrV6,
    peer_addr: Option<SocketAddrV6>,
    bound_interface: Option<u32>,
    last_error: Option<SocketError>,
    queue: DeliveryQueue,
    config: Udp6SocketConfig,
    memberships: HashSet<(u32, Ipv6Addr)>,
}

impl Udp6SocketInner {
    fn new(config: Udp6SocketConfig) -> Self {
        Self {
            state: SocketState::Unbound,
            shutdown: Shutdown::default(),
            endpoint: None,
            local_addr: ANY,
            peer_addr: None,
            bound_interface: None,
            last_error: None,
            queue: DeliveryQueue::new(),
            config,
            memberships: HashSet::new(),
        }
    }

    /// Record `err` as the last error and return it.
    fn fail<T>(&mut self, err: SocketError, op: &'static str) -> Result<T> {
        self.last_error = Some(err);
        tracing::debug!(target: targets::SOCKET, op, state = %self.state, error = %err, "operation rejected");
        Err(err)
    }

    fn ensure_open(&mut self, op: &'static str) -> Result<()> {
        if self.state == SocketState::Closed {
            return self.fail(SocketError::InvalidState, op);
        }
        Ok(())
    }
}

/// Where and how an outgoing datagram leaves the host.
struct Route {
    destination: SocketAddrV6,
    source: Ipv6Addr,
    interface: Option<u32>,
    hop_limit: u8,
    multicast: bool,
}

/// Release the endpoint and withdraw group memberships.
///
/// The endpoint is detached from the demultiplexer before anything else so
/// the inbound path can no longer reach this socket.
fn release_resources(
    demux: &dyn Demultiplexer,
    resolver: &dyn InterfaceResolver,
    inner: &mut Udp6SocketInner,
) -> usize {
    if let Some(handle) = inner.endpoint.take() {
        demux.release(handle);
    }
    for (index, group) in inner.memberships.drain() {
        if let Err(e) = resolver.leave_group(index, &group) {
            tracing::warn!(target: targets::SOCKET, %group, index, error = %e, "failed to leave multicast group");
        }
    }
    inner.state = SocketState::Closed;
    inner.shutdown = Shutdown {
        send: true,
        recv: true,
    };
    inner.peer_addr = None;
    inner.queue.clear()
}

/// A UDP socket over IPv6.
///
/// The socket is driven from two sides: the application calls the
/// operations below, and the network stack pushes inbound datagrams and
/// ICMPv6 errors through the socket's [`Upcall`]. Both sides serialise on a
/// single internal mutex. Nothing ever blocks: an empty queue is reported as
/// [`SocketError::WouldBlock`], and a full queue drops the arriving datagram.
///
/// # Signals
///
/// - [`data_available`](Self::data_available): Emitted once per admitted
///   datagram, with the number of queued bytes
/// - [`packet_dropped`](Self::packet_dropped): Emitted for every discarded
///   inbound datagram
/// - [`closed`](Self::closed): Emitted when the socket is closed or torn down
///
/// # Example
///
/// ```ignore
/// let socket = Udp6Socket::new(1, demux, resolver, Udp6SocketConfig::default());
///
/// socket.data_available.connect(|bytes| {
///     println!("{bytes} bytes waiting");
/// });
///
/// socket.connect("[2001:db8::1]:9000".parse()?)?;
/// socket.send(b"hello")?;
/// ```
pub struct Udp6Socket {
    node_id: u32,
    this: Weak<Udp6Socket>,
    demux: Arc<dyn Demultiplexer>,
    resolver: Arc<dyn InterfaceResolver>,
    inner: Mutex<Udp6SocketInner>,
    icmp_callback: Mutex<Option<IcmpCallback>>,
    readable: Notify,

    /// Signal emitted when a datagram is admitted to the delivery queue.
    pub data_available: Signal<usize>,
    /// Signal emitted when an inbound datagram is discarded.
    pub packet_dropped: Signal<DroppedDatagram>,
    /// Signal emitted when the socket is closed.
    pub closed: Signal<()>,
}

impl Udp6Socket {
    /// Create an unbound socket owned by node `node_id`.
    pub fn new(
        node_id: u32,
        demux: Arc<dyn Demultiplexer>,
        resolver: Arc<dyn InterfaceResolver>,
        config: Udp6SocketConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            node_id,
            this: this.clone(),
            demux,
            resolver,
            inner: Mutex::new(Udp6SocketInner::new(config)),
            icmp_callback: Mutex::new(None),
            readable: Notify::new(),
            data_available: Signal::new(),
            packet_dropped: Signal::new(),
            closed: Signal::new(),
        })
    }

    /// The handle the stack uses to push messages into this socket.
    pub fn upcall(&self) -> Upcall {
        Upcall::new(self.this.clone())
    }

    /// Identifier of the node that owns this socket.
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Always [`SocketType::Datagram`].
    pub fn socket_type(&self) -> SocketType {
        SocketType::Datagram
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> SocketState {
        self.inner.lock().state
    }

    /// Get the half-close status.
    pub fn shutdown_status(&self) -> Shutdown {
        self.inner.lock().shutdown
    }

    /// Check if the socket owns an endpoint.
    pub fn is_bound(&self) -> bool {
        self.inner.lock().state.is_bound()
    }

    /// The error recorded by the most recent failing operation.
    pub fn last_error(&self) -> Option<SocketError> {
        self.inner.lock().last_error
    }

    /// The local address (`[::]:0` while unbound, `None` once closed).
    pub fn local_addr(&self) -> Option<SocketAddrV6> {
        let inner = self.inner.lock();
        (inner.state != SocketState::Closed).then_some(inner.local_addr)
    }

    /// The connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddrV6> {
        self.inner.lock().peer_addr
    }

    /// Bind to the wildcard address and an ephemeral port.
    pub fn bind(&self) -> Result<SocketAddrV6> {
        self.bind_to(ANY)
    }

    /// Bind to `addr`. A port of 0 selects an ephemeral port.
    ///
    /// Multicast and unspecified addresses are accepted. Any other address
    /// must belong to a local interface.
    pub fn bind_to(&self, addr: SocketAddrV6) -> Result<SocketAddrV6> {
        let _span = tracing::debug_span!(target: targets::SOCKET, span_names::SOCKET_OP, op = "bind", node = self.node_id, %addr).entered();
        let mut inner = self.inner.lock();
        inner.ensure_open("bind")?;
        if inner.state.is_bound() {
            return inner.fail(SocketError::InvalidState, "bind");
        }

        let ip = addr.ip();
        if !ip.is_unspecified() && !ip.is_multicast() && !self.resolver.is_local_address(ip) {
            return inner.fail(SocketError::AddressUnavailable, "bind");
        }

        self.attach(&mut inner, addr)
    }

    /// Allocate the endpoint. Caller has checked the socket is unbound.
    fn attach(&self, inner: &mut Udp6SocketInner, addr: SocketAddrV6) -> Result<SocketAddrV6> {
        match self.demux.allocate(addr, self.upcall()) {
            Ok((handle, local)) => {
                inner.endpoint = Some(handle);
                inner.local_addr = local;
                inner.state = SocketState::Bound;
                tracing::debug!(target: targets::SOCKET, node = self.node_id, %local, "socket bound");
                Ok(local)
            }
            Err(e) => inner.fail(e, "bind"),
        }
    }

    /// Fix the default destination. Binds implicitly if needed.
    ///
    /// No packets are exchanged. Connecting again to the same peer succeeds;
    /// connecting to a different peer fails with
    /// [`SocketError::AlreadyConnected`].
    pub fn connect(&self, peer: SocketAddrV6) -> Result<()> {
        let _span = tracing::debug_span!(target: targets::SOCKET, span_names::SOCKET_OP, op = "connect", node = self.node_id, %peer).entered();
        let mut inner = self.inner.lock();
        inner.ensure_open("connect")?;
        if peer.ip().is_unspecified() {
            return inner.fail(SocketError::InvalidArgument, "connect");
        }
        if inner.state == SocketState::Connected {
            if inner.peer_addr == Some(peer) {
                return Ok(());
            }
            return inner.fail(SocketError::AlreadyConnected, "connect");
        }

        if inner.endpoint.is_none() {
            self.attach(&mut inner, ANY)?;
        }
        let Some(handle) = inner.endpoint else {
            return inner.fail(SocketError::InvalidState, "connect");
        };
        if let Err(e) = self.demux.set_peer(handle, peer) {
            return inner.fail(e, "connect");
        }

        inner.peer_addr = Some(peer);
        inner.state = SocketState::Connected;
        tracing::debug!(target: targets::SOCKET, node = self.node_id, %peer, "socket connected");
        Ok(())
    }

    /// Datagram sockets have no backlog; always fails.
    pub fn listen(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("listen")?;
        inner.fail(SocketError::OperationNotSupported, "listen")
    }

    /// Send to the connected peer.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let peer = {
            let mut inner = self.inner.lock();
            inner.ensure_open("send")?;
            let Some(peer) = inner.peer_addr else {
                return inner.fail(SocketError::NotConnected, "send");
            };
            if inner.shutdown.send {
                return inner.fail(SocketError::InvalidState, "send");
            }
            peer
        };
        self.send_to(data, peer)
    }

    /// Send a datagram to `destination`. Binds implicitly if needed.
    ///
    /// Returns the number of bytes accepted by the endpoint.
    pub fn send_to(&self, data: &[u8], destination: SocketAddrV6) -> Result<usize> {
        let _span = tracing::debug_span!(target: targets::SOCKET, span_names::SOCKET_OP, op = "send_to", node = self.node_id, %destination).entered();
        let (handle, datagram) = {
            let mut inner = self.inner.lock();
            inner.ensure_open("send_to")?;
            if inner.shutdown.send {
                return inner.fail(SocketError::InvalidState, "send_to");
            }

            let route = match self.resolve_route(&inner, data.len(), destination) {
                Ok(route) => route,
                Err(e) => return inner.fail(e, "send_to"),
            };

            if inner.endpoint.is_none() {
                self.attach(&mut inner, ANY)?;
            }
            let Some(handle) = inner.endpoint else {
                return inner.fail(SocketError::InvalidState, "send_to");
            };

            let datagram = OutboundDatagram {
                payload: data.to_vec(),
                source: SocketAddrV6::new(route.source, inner.local_addr.port(), 0, 0),
                destination: route.destination,
                hop_limit: route.hop_limit,
                interface: route.interface,
                multicast_loop: route.multicast && inner.config.ip_multicast_loop,
            };
            (handle, datagram)
        };

        // The stack may deliver synchronously, so it is called without the lock.
        match self.demux.send(handle, datagram) {
            Ok(sent) => {
                tracing::trace!(target: targets::SOCKET, sent, "datagram handed to endpoint");
                Ok(sent)
            }
            Err(e) => self.inner.lock().fail(e, "send_to"),
        }
    }

    /// Validate a send and pick source, egress interface and hop limit.
    fn resolve_route(
        &self,
        inner: &Udp6SocketInner,
        len: usize,
        destination: SocketAddrV6,
    ) -> Result<Route> {
        let mut dst_ip = *destination.ip();
        if dst_ip.is_unspecified() {
            dst_ip = Ipv6Addr::LOCALHOST;
        }
        let config = &inner.config;

        if is_broadcast_class(&dst_ip) && !config.allow_broadcast {
            return Err(SocketError::BroadcastNotPermitted);
        }

        let headroom = inner
            .endpoint
            .map_or(MAX_PAYLOAD, |handle| self.demux.tx_available(handle));
        if len > MAX_PAYLOAD.min(headroom) {
            return Err(SocketError::MessageTooLong);
        }

        let multicast = dst_ip.is_multicast();
        let local_ip = *inner.local_addr.ip();
        let (source, interface, hop_limit) = if multicast {
            let interface = match config.multicast_interface() {
                Some(index) if self.resolver.has_interface(index) => index,
                Some(_) => return Err(SocketError::NetworkUnreachable),
                None => inner
                    .bound_interface
                    .or_else(|| self.resolver.default_multicast_interface())
                    .ok_or(SocketError::NetworkUnreachable)?,
            };
            let source = if local_ip.is_unspecified() || local_ip.is_multicast() {
                self.resolver
                    .route(&dst_ip, Some(interface))
                    .map(|(source, _)| source)
                    .ok_or(SocketError::NetworkUnreachable)?
            } else {
                local_ip
            };
            (source, Some(interface), config.ip_multicast_ttl)
        } else if local_ip.is_unspecified() || local_ip.is_multicast() {
            let (source, interface) = self
                .resolver
                .route(&dst_ip, inner.bound_interface)
                .ok_or(SocketError::NetworkUnreachable)?;
            (source, Some(interface), config.ip_ttl)
        } else {
            (local_ip, inner.bound_interface, config.ip_ttl)
        };

        if config.mtu_discover {
            let egress = interface.or_else(|| self.resolver.route(&dst_ip, None).map(|(_, i)| i));
            if let Some(mtu) = egress.and_then(|i| self.resolver.mtu(i))
                && len + HEADER_OVERHEAD > mtu as usize
            {
                return Err(SocketError::MessageTooLong);
            }
        }

        Ok(Route {
            destination: SocketAddrV6::new(dst_ip, destination.port(), 0, destination.scope_id()),
            source,
            interface,
            hop_limit,
            multicast,
        })
    }

    /// Dequeue the oldest datagram's payload, truncated to `max_size`.
    ///
    /// The truncation flag is not returned here; use
    /// [`recv_from`](Self::recv_from) when it matters.
    pub fn recv(&self, max_size: usize) -> Result<Vec<u8>> {
        self.recv_from(max_size).map(|datagram| datagram.data)
    }

    /// Dequeue the oldest datagram together with its source.
    ///
    /// Bytes beyond `max_size` are discarded with the datagram and the
    /// result is flagged as truncated. An empty queue fails with
    /// [`SocketError::WouldBlock`].
    pub fn recv_from(&self, max_size: usize) -> Result<ReceivedDatagram> {
        let mut inner = self.inner.lock();
        inner.ensure_open("recv")?;
        if inner.shutdown.recv {
            return inner.fail(SocketError::InvalidState, "recv");
        }
        let Some(datagram) = inner.queue.pop() else {
            return inner.fail(SocketError::WouldBlock, "recv");
        };
        tracing::trace!(target: targets::QUEUE, size = datagram.len(), remaining = inner.queue.len_bytes(), "dequeued datagram");

        let truncated = datagram.len() > max_size;
        if truncated {
            tracing::debug!(target: targets::QUEUE, size = datagram.len(), max_size, "datagram truncated on receive");
        }
        let mut data = datagram.payload;
        data.truncate(max_size);
        Ok(ReceivedDatagram {
            data,
            source: datagram.source,
            interface: datagram.interface,
            truncated,
        })
    }

    /// Wait until a datagram is queued.
    ///
    /// Fails with [`SocketError::InvalidState`] once the socket is closed or
    /// receiving is shut down. `recv` itself never waits.
    pub async fn readable(&self) -> Result<()> {
        loop {
            let notified = self.readable.notified();
            {
                let mut inner = self.inner.lock();
                inner.ensure_open("readable")?;
                if inner.shutdown.recv {
                    return inner.fail(SocketError::InvalidState, "readable");
                }
                if !inner.queue.is_empty() {
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Disable sending for the rest of the socket's lifetime.
    pub fn shutdown_send(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("shutdown_send")?;
        inner.shutdown.send = true;
        tracing::debug!(target: targets::SOCKET, node = self.node_id, "send shut down");
        Ok(())
    }

    /// Disable receiving for the rest of the socket's lifetime.
    ///
    /// Later arrivals are dropped. The endpoint stays allocated.
    pub fn shutdown_recv(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            inner.ensure_open("shutdown_recv")?;
            inner.shutdown.recv = true;
        }
        tracing::debug!(target: targets::SOCKET, node = self.node_id, "receive shut down");
        self.readable.notify_waiters();
        Ok(())
    }

    /// Close the socket: release the endpoint and discard queued datagrams.
    ///
    /// A second close fails with [`SocketError::InvalidState`].
    pub fn close(&self) -> Result<()> {
        let _span = tracing::debug_span!(target: targets::SOCKET, span_names::SOCKET_OP, op = "close", node = self.node_id).entered();
        let discarded = {
            let mut inner = self.inner.lock();
            inner.ensure_open("close")?;
            release_resources(&*self.demux, &*self.resolver, &mut inner)
        };
        self.finish_close(discarded);
        Ok(())
    }

    /// Forced teardown by the owning node. A no-op on a closed socket.
    pub fn teardown(&self) {
        let discarded = {
            let mut inner = self.inner.lock();
            if inner.state == SocketState::Closed {
                return;
            }
            release_resources(&*self.demux, &*self.resolver, &mut inner)
        };
        self.finish_close(discarded);
    }

    fn finish_close(&self, discarded: usize) {
        tracing::debug!(target: targets::SOCKET, node = self.node_id, discarded, "socket closed");
        self.readable.notify_waiters();
        self.closed.emit(());
    }

    /// Restrict the socket to one interface. Binds implicitly if needed.
    ///
    /// The interface also becomes the multicast egress when no multicast
    /// interface is configured.
    pub fn bind_to_interface(&self, index: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("bind_to_interface")?;
        if !self.resolver.has_interface(index) {
            return inner.fail(SocketError::InvalidArgument, "bind_to_interface");
        }
        if inner.endpoint.is_none() {
            self.attach(&mut inner, ANY)?;
        }
        let Some(handle) = inner.endpoint else {
            return inner.fail(SocketError::InvalidState, "bind_to_interface");
        };
        if let Err(e) = self.demux.bind_to_interface(handle, index) {
            return inner.fail(e, "bind_to_interface");
        }
        inner.bound_interface = Some(index);
        Ok(())
    }

    /// The interface the socket is restricted to, if any.
    pub fn bound_interface(&self) -> Option<u32> {
        self.inner.lock().bound_interface
    }

    /// Join `group` on `interface_index` (0 lets the stack choose).
    pub fn multicast_join_group(&self, interface_index: u32, group: Ipv6Addr) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("multicast_join_group")?;
        self.check_membership_args(&mut inner, interface_index, &group, "multicast_join_group")?;
        if inner.memberships.contains(&(interface_index, group)) {
            return inner.fail(SocketError::MulticastMembershipConflict, "multicast_join_group");
        }
        if let Err(e) = self.resolver.join_group(interface_index, &group) {
            return inner.fail(e, "multicast_join_group");
        }
        inner.memberships.insert((interface_index, group));
        tracing::debug!(target: targets::SOCKET, node = self.node_id, %group, interface_index, "joined multicast group");
        Ok(())
    }

    /// Leave a group previously joined with the same interface index.
    pub fn multicast_leave_group(&self, interface_index: u32, group: Ipv6Addr) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("multicast_leave_group")?;
        self.check_membership_args(&mut inner, interface_index, &group, "multicast_leave_group")?;
        if !inner.memberships.contains(&(interface_index, group)) {
            return inner.fail(SocketError::MulticastMembershipConflict, "multicast_leave_group");
        }
        if let Err(e) = self.resolver.leave_group(interface_index, &group) {
            return inner.fail(e, "multicast_leave_group");
        }
        inner.memberships.remove(&(interface_index, group));
        tracing::debug!(target: targets::SOCKET, node = self.node_id, %group, interface_index, "left multicast group");
        Ok(())
    }

    fn check_membership_args(
        &self,
        inner: &mut Udp6SocketInner,
        interface_index: u32,
        group: &Ipv6Addr,
        op: &'static str,
    ) -> Result<()> {
        if !group.is_multicast() {
            return inner.fail(SocketError::InvalidArgument, op);
        }
        if interface_index != 0 && !self.resolver.has_interface(interface_index) {
            return inner.fail(SocketError::InvalidArgument, op);
        }
        Ok(())
    }

    /// Groups currently joined, as (interface index, group) pairs.
    pub fn multicast_memberships(&self) -> Vec<(u32, Ipv6Addr)> {
        self.inner.lock().memberships.iter().copied().collect()
    }

    /// Largest payload a send can currently carry. Zero once closed.
    pub fn tx_available(&self) -> usize {
        let inner = self.inner.lock();
        match (inner.state, inner.endpoint) {
            (SocketState::Closed, _) => 0,
            (_, Some(handle)) => self.demux.tx_available(handle).min(MAX_PAYLOAD),
            (_, None) => MAX_PAYLOAD,
        }
    }

    /// Bytes currently queued for reception.
    pub fn rx_available(&self) -> usize {
        self.inner.lock().queue.len_bytes()
    }

    /// Number of datagrams currently queued for reception.
    pub fn queued_datagrams(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Register the single ICMP error callback, replacing any previous one.
    pub fn set_icmp_callback<F>(&self, callback: F)
    where
        F: Fn(&IcmpReport) + Send + Sync + 'static,
    {
        *self.icmp_callback.lock() = Some(Arc::new(callback));
    }

    /// Remove the ICMP error callback.
    pub fn clear_icmp_callback(&self) {
        *self.icmp_callback.lock() = None;
    }

    // Configuration block

    /// A snapshot of the socket's configuration.
    pub fn config(&self) -> Udp6SocketConfig {
        self.inner.lock().config.clone()
    }

    /// Read an option by name.
    pub fn option(&self, name: SocketOptionName) -> SocketOption {
        self.inner.lock().config.get(name)
    }

    /// Write a single option. Fails with [`SocketError::InvalidState`] once closed.
    pub fn set_option(&self, option: SocketOption) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open("set_option")?;
        inner.config.set(option);
        tracing::trace!(target: targets::SOCKET, option = %option.name(), "option set");
        Ok(())
    }

    /// Allow or forbid broadcast-class destinations.
    pub fn set_allow_broadcast(&self, allow: bool) -> Result<()> {
        self.set_option(SocketOption::AllowBroadcast(allow))
    }

    /// Whether broadcast-class destinations are allowed.
    pub fn allow_broadcast(&self) -> bool {
        self.inner.lock().config.allow_broadcast
    }

    /// Set the receive buffer size.
    pub fn set_rcv_buf_size(&self, size: usize) -> Result<()> {
        self.set_option(SocketOption::RecvBufferSize(size))
    }

    /// Receive buffer size in bytes.
    pub fn rcv_buf_size(&self) -> usize {
        self.inner.lock().config.recv_buffer_size
    }

    /// Set the unicast hop limit.
    pub fn set_ip_ttl(&self, ttl: u8) -> Result<()> {
        self.set_option(SocketOption::IpTtl(ttl))
    }

    /// Unicast hop limit.
    pub fn ip_ttl(&self) -> u8 {
        self.inner.lock().config.ip_ttl
    }

    /// Set the multicast hop limit.
    pub fn set_ip_multicast_ttl(&self, ttl: u8) -> Result<()> {
        self.set_option(SocketOption::IpMulticastTtl(ttl))
    }

    /// Multicast hop limit.
    pub fn ip_multicast_ttl(&self) -> u8 {
        self.inner.lock().config.ip_multicast_ttl
    }

    /// Select the multicast egress interface (`-1` for the default).
    pub fn set_ip_multicast_if(&self, index: i32) -> Result<()> {
        self.set_option(SocketOption::IpMulticastIf(index))
    }

    /// Multicast egress interface, `-1` when unset.
    pub fn ip_multicast_if(&self) -> i32 {
        self.inner.lock().config.ip_multicast_if
    }

    /// Enable or disable multicast loopback.
    pub fn set_ip_multicast_loop(&self, enabled: bool) -> Result<()> {
        self.set_option(SocketOption::IpMulticastLoop(enabled))
    }

    /// Whether multicast loopback is enabled.
    pub fn ip_multicast_loop(&self) -> bool {
        self.inner.lock().config.ip_multicast_loop
    }

    /// Enable or disable path MTU discovery.
    pub fn set_mtu_discover(&self, enabled: bool) -> Result<()> {
        self.set_option(SocketOption::MtuDiscover(enabled))
    }

    /// Whether path MTU discovery is enabled.
    pub fn mtu_discover(&self) -> bool {
        self.inner.lock().config.mtu_discover
    }

    // Stack-facing side

    pub(crate) fn handle_stack_message(&self, message: StackMessage) {
        let _span = tracing::trace_span!(target: targets::SOCKET, span_names::UPCALL, node = self.node_id).entered();
        match message {
            StackMessage::DataArrived(datagram) => self.forward_up(datagram),
            StackMessage::IcmpError(report) => self.forward_icmp(report),
        }
    }

    fn forward_up(&self, datagram: InboundDatagram) {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.state == SocketState::Closed {
                Err((datagram, DropReason::Closed))
            } else if inner.shutdown.recv {
                Err((datagram, DropReason::RecvShutdown))
            } else {
                let limit = inner.config.recv_buffer_size;
                match inner.queue.admit(datagram, limit) {
                    Ok(()) => Ok(inner.queue.len_bytes()),
                    Err(datagram) => Err((datagram, DropReason::BufferFull)),
                }
            }
        };

        match outcome {
            Ok(available) => {
                self.readable.notify_waiters();
                self.data_available.emit(available);
            }
            Err((datagram, reason)) => {
                tracing::debug!(
                    target: targets::QUEUE,
                    node = self.node_id,
                    size = datagram.len(),
                    source = %datagram.source,
                    %reason,
                    "dropped inbound datagram"
                );
                self.packet_dropped.emit(DroppedDatagram { datagram, reason });
            }
        }
    }

    fn forward_icmp(&self, report: IcmpReport) {
        let error = report.error();
        {
            let mut inner = self.inner.lock();
            if inner.state == SocketState::Closed {
                tracing::trace!(target: targets::ICMP, node = self.node_id, "icmp error for closed socket ignored");
                return;
            }
            if inner.state == SocketState::Connected
                && let Some(err) = error
            {
                inner.last_error = Some(err);
            }
        }
        tracing::debug!(
            target: targets::ICMP,
            node = self.node_id,
            source = %report.source,
            icmp_type = report.icmp_type,
            code = report.code,
            info = report.info,
            "icmp error received"
        );

        let callback = self.icmp_callback.lock().clone();
        if let Some(callback) = callback {
            callback(&report);
        }
    }
}

impl Drop for Udp6Socket {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state != SocketState::Closed {
            release_resources(&*self.demux, &*self.resolver, inner);
        }
    }
}

impl std::fmt::Debug for Udp6Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Udp6Socket")
            .field("node_id", &self.node_id)
            .field("state", &inner.state)
            .field("shutdown", &inner.shutdown)
            .field("local_addr", &inner.local_addr)
            .field("peer_addr", &inner.peer_addr)
            .field("rx_available", &inner.queue.len_bytes())
            .finish()
    }
}

static_assertions::assert_impl_all!(Udp6Socket: Send, Sync);

impl DatagramSocket for Udp6Socket {
    type Address = SocketAddrV6;
    type Group = Ipv6Addr;
    type Received = ReceivedDatagram;

    fn socket_type(&self) -> SocketType {
        Udp6Socket::socket_type(self)
    }

    fn bind(&self) -> Result<SocketAddrV6> {
        Udp6Socket::bind(self)
    }

    fn bind_to(&self, addr: SocketAddrV6) -> Result<SocketAddrV6> {
        Udp6Socket::bind_to(self, addr)
    }

    fn connect(&self, peer: SocketAddrV6) -> Result<()> {
        Udp6Socket::connect(self, peer)
    }

    fn listen(&self) -> Result<()> {
        Udp6Socket::listen(self)
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        Udp6Socket::send(self, data)
    }

    fn send_to(&self, data: &[u8], destination: SocketAddrV6) -> Result<usize> {
        Udp6Socket::send_to(self, data, destination)
    }

    fn recv(&self, max_size: usize) -> Result<Vec<u8>> {
        Udp6Socket::recv(self, max_size)
    }

    fn recv_from(&self, max_size: usize) -> Result<ReceivedDatagram> {
        Udp6Socket::recv_from(self, max_size)
    }

    fn shutdown_send(&self) -> Result<()> {
        Udp6Socket::shutdown_send(self)
    }

    fn shutdown_recv(&self) -> Result<()> {
        Udp6Socket::shutdown_recv(self)
    }

    fn close(&self) -> Result<()> {
        Udp6Socket::close(self)
    }

    fn multicast_join_group(&self, interface_index: u32, group: Ipv6Addr) -> Result<()> {
        Udp6Socket::multicast_join_group(self, interface_index, group)
    }

    fn multicast_leave_group(&self, interface_index: u32, group: Ipv6Addr) -> Result<()> {
        Udp6Socket::multicast_leave_group(self, interface_index, group)
    }

    fn tx_available(&self) -> usize {
        Udp6Socket::tx_available(self)
    }

    fn rx_available(&self) -> usize {
        Udp6Socket::rx_available(self)
    }

    fn set_allow_broadcast(&self, allow: bool) -> Result<()> {
        Udp6Socket::set_allow_broadcast(self, allow)
    }

    fn allow_broadcast(&self) -> bool {
        Udp6Socket::allow_broadcast(self)
    }

    fn last_error(&self) -> Option<SocketError> {
        Udp6Socket::last_error(self)
    }

    fn local_addr(&self) -> Option<SocketAddrV6> {
        Udp6Socket::local_addr(self)
    }
}
