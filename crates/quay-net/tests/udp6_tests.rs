//! Tests for UDP/IPv6 socket functionality.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use quay_net::udp6::{
    DropReason, EPHEMERAL_PORT_FIRST, EndpointTable, IcmpReport, InboundDatagram, Interface,
    MAX_PAYLOAD, SocketOption, SocketOptionName, SocketState, StackMessage, StaticInterfaces,
    TYPE_DESTINATION_UNREACHABLE, Udp6Socket, Udp6SocketFactory,
};
use quay_net::{DatagramSocket, SocketError, SocketType};

struct Node {
    demux: Arc<EndpointTable>,
    interfaces: Arc<StaticInterfaces>,
    factory: Udp6SocketFactory,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A node with loopback (1) and eth0 (2, fe80::1 and 2001:db8::1, MTU 1500).
fn node() -> Node {
    init_logging();
    let demux = Arc::new(EndpointTable::new());
    let interfaces = Arc::new(
        StaticInterfaces::new()
            .with_interface(Interface::loopback(1))
            .with_interface(
                Interface::new(2, "eth0")
                    .address(ip("fe80::1"))
                    .address(ip("2001:db8::1")),
            ),
    );
    let factory = Udp6SocketFactory::new(7, demux.clone(), interfaces.clone());
    Node {
        demux,
        interfaces,
        factory,
    }
}

fn ip(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn addr(s: &str) -> SocketAddrV6 {
    s.parse().unwrap()
}

fn inbound(payload: &[u8], from: &str, to: &str) -> InboundDatagram {
    InboundDatagram::new(payload, addr(from), addr(to))
}

#[test]
fn test_socket_initial_state() {
    let node = node();
    let socket = node.factory.create_socket();

    assert_eq!(socket.state(), SocketState::Unbound);
    assert!(!socket.is_bound());
    assert_eq!(socket.local_addr(), Some(addr("[::]:0")));
    assert_eq!(socket.peer_addr(), None);
    assert_eq!(socket.tx_available(), MAX_PAYLOAD);
    assert_eq!(socket.rx_available(), 0);
    assert_eq!(socket.socket_type(), SocketType::Datagram);
    assert_eq!(socket.node_id(), 7);
    assert_eq!(socket.last_error(), None);
}

#[test]
fn test_bind_ephemeral_port() {
    let node = node();
    let socket = node.factory.create_socket();

    let local = socket.bind().unwrap();
    assert!(local.ip().is_unspecified());
    assert_eq!(local.port(), EPHEMERAL_PORT_FIRST);
    assert_eq!(socket.state(), SocketState::Bound);
    assert_eq!(node.demux.len(), 1);

    assert_eq!(socket.bind(), Err(SocketError::InvalidState));
    assert_eq!(socket.last_error(), Some(SocketError::InvalidState));
    assert_eq!(socket.local_addr(), Some(local));
}

#[test]
fn test_bind_to_address() {
    let node = node();

    let foreign = node.factory.create_socket();
    assert_eq!(
        foreign.bind_to(addr("[2001:db8::99]:5000")),
        Err(SocketError::AddressUnavailable)
    );
    assert_eq!(foreign.state(), SocketState::Unbound);

    let local = node.factory.create_socket();
    assert_eq!(
        local.bind_to(addr("[2001:db8::1]:5000")),
        Ok(addr("[2001:db8::1]:5000"))
    );

    let group = node.factory.create_socket();
    assert!(group.bind_to(addr("[ff02::fb]:5353")).is_ok());
}

#[test]
fn test_bind_address_in_use() {
    let node = node();
    let first = node.factory.create_socket();
    let second = node.factory.create_socket();

    first.bind_to(addr("[::]:6000")).unwrap();
    assert_eq!(
        second.bind_to(addr("[2001:db8::1]:6000")),
        Err(SocketError::AddressInUse)
    );
    assert_eq!(second.last_error(), Some(SocketError::AddressInUse));
    assert_eq!(second.state(), SocketState::Unbound);
}

#[test]
fn test_connect_binds_implicitly() {
    let node = node();
    let socket = node.factory.create_socket();
    let peer = addr("[2001:db8::2]:9000");

    socket.connect(peer).unwrap();

    assert_eq!(socket.state(), SocketState::Connected);
    assert_eq!(socket.peer_addr(), Some(peer));
    assert_eq!(socket.local_addr().map(|a| a.port()), Some(EPHEMERAL_PORT_FIRST));
    assert!(node.demux.take_transmitted().is_empty());
}

#[test]
fn test_connect_rules() {
    let node = node();
    let socket = node.factory.create_socket();
    let peer = addr("[2001:db8::2]:9000");

    assert_eq!(socket.connect(addr("[::]:9000")), Err(SocketError::InvalidArgument));

    socket.connect(peer).unwrap();
    assert_eq!(socket.connect(peer), Ok(()));
    assert_eq!(
        socket.connect(addr("[2001:db8::3]:9000")),
        Err(SocketError::AlreadyConnected)
    );
    assert_eq!(socket.peer_addr(), Some(peer));
}

#[test]
fn test_listen_not_supported() {
    let node = node();
    let socket = node.factory.create_socket();
    assert_eq!(socket.listen(), Err(SocketError::OperationNotSupported));
    assert_eq!(socket.last_error(), Some(SocketError::OperationNotSupported));
}

#[test]
fn test_send_requires_connection() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind().unwrap();

    assert_eq!(socket.send(b"data"), Err(SocketError::NotConnected));
    assert_eq!(socket.last_error(), Some(SocketError::NotConnected));
}

#[test]
fn test_send_to_connected_peer() {
    let node = node();
    let socket = node.factory.create_socket();
    let peer = addr("[2001:db8::2]:9000");
    socket.connect(peer).unwrap();

    assert_eq!(socket.send(b"hello"), Ok(5));

    let sent = node.demux.take_transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, b"hello");
    assert_eq!(sent[0].destination, peer);
    assert_eq!(sent[0].source, SocketAddrV6::new(ip("2001:db8::1"), EPHEMERAL_PORT_FIRST, 0, 0));
    assert_eq!(sent[0].hop_limit, 64);
    assert_eq!(sent[0].interface, Some(2));
    assert!(!sent[0].multicast_loop);
}

#[test]
fn test_send_to_binds_implicitly() {
    let node = node();
    let socket = node.factory.create_socket();

    assert_eq!(socket.send_to(b"", addr("[2001:db8::2]:53")), Ok(0));
    assert_eq!(socket.state(), SocketState::Bound);
    assert_eq!(node.demux.take_transmitted().len(), 1);
}

#[test]
fn test_send_to_unspecified_goes_to_loopback() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.set_ip_ttl(12).unwrap();

    socket.send_to(b"x", addr("[::]:7")).unwrap();

    let sent = node.demux.take_transmitted();
    assert_eq!(sent[0].destination, addr("[::1]:7"));
    assert_eq!(*sent[0].source.ip(), Ipv6Addr::LOCALHOST);
    assert_eq!(sent[0].interface, Some(1));
    assert_eq!(sent[0].hop_limit, 12);
}

#[test]
fn test_broadcast_requires_permission() {
    let node = node();
    let socket = node.factory.create_socket();
    let all_nodes = addr("[ff02::1]:5000");

    assert_eq!(
        socket.send_to(b"hi", all_nodes),
        Err(SocketError::BroadcastNotPermitted)
    );
    assert!(node.demux.take_transmitted().is_empty());

    socket.set_allow_broadcast(true).unwrap();
    assert!(socket.allow_broadcast());
    assert_eq!(socket.send_to(b"hi", all_nodes), Ok(2));
    assert_eq!(node.demux.take_transmitted().len(), 1);
}

#[test]
fn test_message_too_long() {
    let node = node();
    let socket = node.factory.create_socket();
    let dest = addr("[2001:db8::2]:9000");

    let oversized = vec![0u8; MAX_PAYLOAD + 1];
    assert_eq!(socket.send_to(&oversized, dest), Err(SocketError::MessageTooLong));
    assert_eq!(socket.last_error(), Some(SocketError::MessageTooLong));

    let largest = vec![0u8; MAX_PAYLOAD];
    assert_eq!(socket.send_to(&largest, dest), Ok(MAX_PAYLOAD));
}

#[test]
fn test_mtu_discover_limits_payload() {
    let node = node();
    let socket = node.factory.create_socket();
    let dest = addr("[2001:db8::2]:9000");
    socket.set_mtu_discover(true).unwrap();

    assert_eq!(socket.send_to(&[0u8; 1452], dest), Ok(1452));
    assert_eq!(
        socket.send_to(&[0u8; 1453], dest),
        Err(SocketError::MessageTooLong)
    );
}

#[test]
fn test_multicast_send_options() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.set_ip_multicast_ttl(1).unwrap();
    socket.set_ip_multicast_loop(true).unwrap();

    socket.send_to(b"query", addr("[ff02::fb]:5353")).unwrap();

    let sent = node.demux.take_transmitted();
    assert_eq!(sent[0].hop_limit, 1);
    assert_eq!(sent[0].interface, Some(2));
    assert_eq!(*sent[0].source.ip(), ip("fe80::1"));
    assert!(sent[0].multicast_loop);

    socket.set_ip_multicast_if(9).unwrap();
    assert_eq!(
        socket.send_to(b"query", addr("[ff02::fb]:5353")),
        Err(SocketError::NetworkUnreachable)
    );
}

#[test]
fn test_receive_datagram() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();

    let announced = Arc::new(Mutex::new(Vec::new()));
    let announced_clone = announced.clone();
    socket.data_available.connect(move |bytes| {
        announced_clone.lock().push(*bytes);
    });

    let delivered = node.demux.deliver(
        inbound(b"ping", "[2001:db8::2]:4000", "[2001:db8::1]:5000").on_interface(2),
    );
    assert_eq!(delivered, 1);
    assert_eq!(*announced.lock(), vec![4]);
    assert_eq!(socket.rx_available(), 4);

    let received = socket.recv_from(1500).unwrap();
    assert_eq!(received.data, b"ping");
    assert_eq!(received.source, addr("[2001:db8::2]:4000"));
    assert_eq!(received.interface, Some(2));
    assert!(!received.truncated);
    assert_eq!(socket.rx_available(), 0);

    assert_eq!(socket.recv(1500), Err(SocketError::WouldBlock));
    assert_eq!(socket.last_error(), Some(SocketError::WouldBlock));
}

#[test]
fn test_receive_fifo_with_truncation() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();

    node.demux.deliver(inbound(b"hello world", "[::1]:1", "[::1]:5000"));
    node.demux.deliver(inbound(b"", "[::1]:2", "[::1]:5000"));
    node.demux.deliver(inbound(b"abc", "[::1]:3", "[::1]:5000"));
    assert_eq!(socket.rx_available(), 14);
    assert_eq!(socket.queued_datagrams(), 3);

    let first = socket.recv_from(5).unwrap();
    assert_eq!(first.data, b"hello");
    assert!(first.truncated);
    assert_eq!(socket.rx_available(), 3);

    // Zero-length datagrams are delivered in order.
    let second = socket.recv_from(5).unwrap();
    assert!(second.data.is_empty());
    assert_eq!(second.source.port(), 2);

    assert_eq!(socket.recv(5).unwrap(), b"abc");
}

#[test]
fn test_receive_buffer_overflow_drops() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.set_rcv_buf_size(1000).unwrap();
    socket.bind_to(addr("[::]:5000")).unwrap();

    let drops = Arc::new(Mutex::new(Vec::new()));
    let drops_clone = drops.clone();
    socket.packet_dropped.connect(move |dropped| {
        drops_clone.lock().push((dropped.datagram.len(), dropped.reason));
    });

    node.demux.deliver(inbound(&[1; 600], "[::1]:1", "[::1]:5000"));
    node.demux.deliver(inbound(&[2; 600], "[::1]:1", "[::1]:5000"));
    assert_eq!(socket.rx_available(), 600);
    assert_eq!(*drops.lock(), vec![(600, DropReason::BufferFull)]);

    node.demux.deliver(inbound(&[3; 400], "[::1]:1", "[::1]:5000"));
    assert_eq!(socket.rx_available(), 1000);
    assert_eq!(drops.lock().len(), 1);
}

#[test]
fn test_shutdown_recv() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();
    node.demux.deliver(inbound(b"early", "[::1]:1", "[::1]:5000"));

    let drops = Arc::new(AtomicUsize::new(0));
    let drops_clone = drops.clone();
    socket.packet_dropped.connect(move |dropped| {
        assert_eq!(dropped.reason, DropReason::RecvShutdown);
        drops_clone.fetch_add(1, Ordering::SeqCst);
    });

    socket.shutdown_recv().unwrap();
    assert!(socket.shutdown_status().recv);
    assert_eq!(socket.state(), SocketState::Bound);

    node.demux.deliver(inbound(b"late", "[::1]:1", "[::1]:5000"));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(socket.rx_available(), 5);
    assert_eq!(socket.recv(100), Err(SocketError::InvalidState));

    // Sending is unaffected.
    assert!(socket.send_to(b"out", addr("[::1]:9")).is_ok());
}

#[test]
fn test_shutdown_send() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.connect(addr("[2001:db8::2]:9000")).unwrap();

    socket.shutdown_send().unwrap();
    socket.shutdown_send().unwrap();

    assert_eq!(socket.send(b"x"), Err(SocketError::InvalidState));
    assert_eq!(
        socket.send_to(b"x", addr("[2001:db8::3]:9000")),
        Err(SocketError::InvalidState)
    );
    assert!(node.demux.take_transmitted().is_empty());

    node.demux.deliver(inbound(b"in", "[2001:db8::2]:9000", "[2001:db8::1]:49152"));
    assert_eq!(socket.recv(10).unwrap(), b"in");
}

#[test]
fn test_close_releases_everything() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();
    node.demux.deliver(inbound(b"pending", "[::1]:1", "[::1]:5000"));

    let closed = Arc::new(AtomicUsize::new(0));
    let closed_clone = closed.clone();
    socket.closed.connect(move |_| {
        closed_clone.fetch_add(1, Ordering::SeqCst);
    });

    socket.close().unwrap();

    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(socket.state(), SocketState::Closed);
    assert!(node.demux.is_empty());
    assert_eq!(socket.rx_available(), 0);
    assert_eq!(socket.tx_available(), 0);
    assert_eq!(socket.local_addr(), None);

    assert_eq!(socket.close(), Err(SocketError::InvalidState));
    assert_eq!(socket.bind(), Err(SocketError::InvalidState));
    assert_eq!(socket.send_to(b"x", addr("[::1]:1")), Err(SocketError::InvalidState));
    assert_eq!(socket.recv(10), Err(SocketError::InvalidState));
    assert_eq!(socket.shutdown_send(), Err(SocketError::InvalidState));
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    // The port is free again.
    let other = node.factory.create_socket();
    assert!(other.bind_to(addr("[::]:5000")).is_ok());
}

#[test]
fn test_upcall_after_close_drops() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind().unwrap();
    let upcall = socket.upcall();

    let reasons = Arc::new(Mutex::new(Vec::new()));
    let reasons_clone = reasons.clone();
    socket.packet_dropped.connect(move |dropped| {
        reasons_clone.lock().push(dropped.reason);
    });

    socket.close().unwrap();
    assert!(upcall.deliver(StackMessage::DataArrived(inbound(b"x", "[::1]:1", "[::1]:2"))));

    assert_eq!(*reasons.lock(), vec![DropReason::Closed]);
    assert_eq!(socket.rx_available(), 0);
}

#[test]
fn test_multicast_membership() {
    let node = node();
    let socket = node.factory.create_socket();
    let group = ip("ff02::fb");

    socket.multicast_join_group(0, group).unwrap();
    assert!(node.interfaces.is_member(2, &group));
    assert_eq!(
        socket.multicast_join_group(0, group),
        Err(SocketError::MulticastMembershipConflict)
    );
    assert_eq!(
        socket.multicast_join_group(0, ip("2001:db8::5")),
        Err(SocketError::InvalidArgument)
    );
    assert_eq!(
        socket.multicast_join_group(42, group),
        Err(SocketError::InvalidArgument)
    );

    socket.multicast_leave_group(0, group).unwrap();
    assert!(!node.interfaces.is_member(2, &group));
    assert_eq!(
        socket.multicast_leave_group(0, group),
        Err(SocketError::MulticastMembershipConflict)
    );
}

#[test]
fn test_close_leaves_groups() {
    let node = node();
    let socket = node.factory.create_socket();
    let group = ip("ff02::1:3");

    socket.multicast_join_group(2, group).unwrap();
    assert_eq!(socket.multicast_memberships(), vec![(2, group)]);

    socket.close().unwrap();
    assert!(!node.interfaces.is_member(2, &group));
}

#[test]
fn test_icmp_error_on_connected_socket() {
    let node = node();
    let socket = node.factory.create_socket();
    let peer = addr("[2001:db8::2]:9000");
    socket.connect(peer).unwrap();

    let reports = Arc::new(Mutex::new(Vec::new()));
    let reports_clone = reports.clone();
    socket.set_icmp_callback(move |report| {
        reports_clone.lock().push(*report);
    });

    let local = SocketAddrV6::new(ip("2001:db8::1"), EPHEMERAL_PORT_FIRST, 0, 0);
    let report = IcmpReport::new(ip("2001:db8::2"), 64, TYPE_DESTINATION_UNREACHABLE, 4, 0);
    assert_eq!(node.demux.deliver_icmp(local, peer, report), 1);

    assert_eq!(socket.last_error(), Some(SocketError::ConnectionRefused));
    assert_eq!(*reports.lock(), vec![report]);
    assert_eq!(socket.rx_available(), 0);

    socket.clear_icmp_callback();
    node.demux.deliver_icmp(local, peer, report);
    assert_eq!(reports.lock().len(), 1);
}

#[test]
fn test_icmp_error_on_unconnected_socket() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    socket.set_icmp_callback(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    let report = IcmpReport::new(ip("2001:db8::fe"), 60, TYPE_DESTINATION_UNREACHABLE, 0, 0);
    socket.upcall().deliver(StackMessage::IcmpError(report));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(socket.last_error(), None);
}

#[test]
fn test_options_by_name() {
    let node = node();
    let socket = node.factory.create_socket();

    assert_eq!(socket.option(SocketOptionName::RecvBufferSize), SocketOption::RecvBufferSize(131_072));
    assert_eq!(socket.option(SocketOptionName::IpMulticastIf), SocketOption::IpMulticastIf(-1));

    socket.set_option(SocketOption::IpTtl(3)).unwrap();
    assert_eq!(socket.ip_ttl(), 3);
    assert_eq!(socket.config().ip_ttl, 3);

}

#[test]
fn test_options_rejected_after_close() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.close().unwrap();

    assert_eq!(socket.set_allow_broadcast(true), Err(SocketError::InvalidState));
    assert_eq!(socket.set_rcv_buf_size(5), Err(SocketError::InvalidState));
    assert_eq!(socket.set_option(SocketOption::IpTtl(3)), Err(SocketError::InvalidState));
    assert_eq!(socket.last_error(), Some(SocketError::InvalidState));

    assert!(!socket.allow_broadcast());
    assert_eq!(socket.rcv_buf_size(), 131_072);
    assert_eq!(socket.ip_ttl(), 64);
}

#[test]
fn test_bind_to_interface() {
    let node = node();
    let socket = node.factory.create_socket();

    assert_eq!(socket.bind_to_interface(9), Err(SocketError::InvalidArgument));
    socket.bind_to_interface(2).unwrap();

    assert_eq!(socket.state(), SocketState::Bound);
    assert_eq!(socket.bound_interface(), Some(2));

    socket.send_to(b"x", addr("[2001:db8::2]:1")).unwrap();
    assert_eq!(node.demux.take_transmitted()[0].interface, Some(2));
}

#[test]
fn test_datagram_socket_trait() {
    fn receive<S: DatagramSocket>(socket: &S, max_size: usize) -> S::Received {
        socket.recv_from(max_size).unwrap()
    }

    let node = node();
    let socket = node.factory.create_socket();
    DatagramSocket::bind_to(&*socket, addr("[::]:5000")).unwrap();
    node.demux.deliver(inbound(b"trait", "[::1]:44", "[::1]:5000"));
    node.demux.deliver(inbound(b"truncated", "[::1]:45", "[::1]:5000"));

    let first = receive(&*socket, 64);
    assert_eq!(first.data, b"trait");
    assert_eq!(first.source, addr("[::1]:44"));
    assert!(!first.truncated);

    let second = receive(&*socket, 5);
    assert_eq!(second.data, b"trunc");
    assert!(second.truncated);

    assert_eq!(DatagramSocket::set_allow_broadcast(&*socket, true), Ok(()));
}

#[test]
fn test_send_after_close_fails() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.connect(addr("[2001:db8::1]:9000")).unwrap();

    assert_eq!(socket.send(&[0; 100]), Ok(100));

    socket.close().unwrap();
    assert_eq!(socket.send(&[0; 100]), Err(SocketError::InvalidState));
    assert_eq!(socket.last_error(), Some(SocketError::InvalidState));
    assert_eq!(node.demux.take_transmitted().len(), 1);
}

#[test]
fn test_icmp_after_close_is_ignored() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.connect(addr("[2001:db8::2]:9000")).unwrap();
    let upcall = socket.upcall();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    socket.set_icmp_callback(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    socket.close().unwrap();
    let report = IcmpReport::new(ip("2001:db8::2"), 64, TYPE_DESTINATION_UNREACHABLE, 4, 0);
    assert!(upcall.deliver(StackMessage::IcmpError(report)));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(socket.last_error(), None);
}

#[test]
fn test_teardown_all() {
    let node = node();
    let a = node.factory.create_socket();
    let b = node.factory.create_socket();
    a.bind().unwrap();
    b.connect(addr("[2001:db8::2]:9000")).unwrap();
    assert_eq!(node.factory.socket_count(), 2);

    let closed = Arc::new(AtomicUsize::new(0));
    for socket in [&a, &b] {
        let closed = closed.clone();
        socket.closed.connect(move |_| {
            closed.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert_eq!(node.factory.teardown_all(), 2);
    assert_eq!(a.state(), SocketState::Closed);
    assert_eq!(b.state(), SocketState::Closed);
    assert!(node.demux.is_empty());
    assert_eq!(closed.load(Ordering::SeqCst), 2);

    a.teardown();
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_drop_releases_endpoint() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();
    let upcall = socket.upcall();

    drop(socket);

    assert!(node.demux.is_empty());
    assert!(!upcall.is_alive());
    assert!(!upcall.deliver(StackMessage::DataArrived(inbound(b"x", "[::1]:1", "[::1]:5000"))));
    assert_eq!(node.factory.socket_count(), 0);
}

#[test]
fn test_socket_is_usable_across_threads() {
    let node = node();
    let socket: Arc<Udp6Socket> = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();

    let demux = node.demux.clone();
    let producer = std::thread::spawn(move || {
        for i in 0..50u8 {
            demux.deliver(inbound(&[i], "[::1]:1", "[::1]:5000"));
        }
    });
    producer.join().unwrap();

    let mut received = Vec::new();
    while let Ok(data) = socket.recv(8) {
        received.extend(data);
    }
    assert_eq!(received, (0..50u8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readable_wakes_on_arrival() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind_to(addr("[::]:5000")).unwrap();

    let waiter = {
        let socket = socket.clone();
        tokio::spawn(async move {
            socket.readable().await?;
            socket.recv(100)
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    node.demux.deliver(inbound(b"wake", "[::1]:1", "[::1]:5000"));

    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("readable should resolve")
        .unwrap();
    assert_eq!(result, Ok(b"wake".to_vec()));
}

#[tokio::test]
async fn test_readable_fails_after_close() {
    let node = node();
    let socket = node.factory.create_socket();
    socket.bind().unwrap();

    let waiter = {
        let socket = socket.clone();
        tokio::spawn(async move { socket.readable().await })
    };
    tokio::task::yield_now().await;
    socket.close().unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("readable should resolve")
        .unwrap();
    assert_eq!(result, Err(SocketError::InvalidState));
}
