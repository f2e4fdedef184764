//! Per-node socket factory.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use quay_core::logging::targets;

use super::config::Udp6SocketConfig;
use super::endpoint::{Demultiplexer, InterfaceResolver};
use super::socket::Udp6Socket;

/// Creates UDP/IPv6 sockets for one node and tears them down with it.
///
/// Every socket shares the node's demultiplexer and interface resolver and
/// starts from the factory's default configuration.
pub struct Udp6SocketFactory {
    node_id: u32,
    demux: Arc<dyn Demultiplexer>,
    resolver: Arc<dyn InterfaceResolver>,
    defaults: Mutex<Udp6SocketConfig>,
    sockets: Mutex<Vec<Weak<Udp6Socket>>>,
}

impl Udp6SocketFactory {
    /// Create a factory for node `node_id`.
    pub fn new(
        node_id: u32,
        demux: Arc<dyn Demultiplexer>,
        resolver: Arc<dyn InterfaceResolver>,
    ) -> Self {
        Self {
            node_id,
            demux,
            resolver,
            defaults: Mutex::new(Udp6SocketConfig::default()),
            sockets: Mutex::new(Vec::new()),
        }
    }

    /// Set the configuration new sockets start with (builder form).
    pub fn with_defaults(self, config: Udp6SocketConfig) -> Self {
        *self.defaults.lock() = config;
        self
    }

    /// Replace the configuration new sockets start with.
    pub fn set_defaults(&self, config: Udp6SocketConfig) {
        *self.defaults.lock() = config;
    }

    /// The configuration new sockets start with.
    pub fn defaults(&self) -> Udp6SocketConfig {
        self.defaults.lock().clone()
    }

    /// Node the sockets belong to.
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Create a new unbound socket.
    pub fn create_socket(&self) -> Arc<Udp6Socket> {
        let socket = Udp6Socket::new(
            self.node_id,
            Arc::clone(&self.demux),
            Arc::clone(&self.resolver),
            self.defaults(),
        );
        let mut sockets = self.sockets.lock();
        sockets.retain(|s| s.strong_count() > 0);
        sockets.push(Arc::downgrade(&socket));
        tracing::debug!(target: targets::SOCKET, node = self.node_id, live = sockets.len(), "socket created");
        socket
    }

    /// Number of sockets created here that still exist.
    pub fn socket_count(&self) -> usize {
        self.sockets.lock().iter().filter(|s| s.strong_count() > 0).count()
    }

    /// Tear down every live socket, as when the node is destroyed.
    ///
    /// Returns the number of sockets that were torn down.
    pub fn teardown_all(&self) -> usize {
        let live: Vec<_> = self
            .sockets
            .lock()
            .drain(..)
            .filter_map(|s| s.upgrade())
            .collect();
        for socket in &live {
            socket.teardown();
        }
        tracing::debug!(target: targets::SOCKET, node = self.node_id, count = live.len(), "node sockets torn down");
        live.len()
    }
}

impl std::fmt::Debug for Udp6SocketFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Udp6SocketFactory")
            .field("node_id", &self.node_id)
            .field("sockets", &self.socket_count())
            .finish()
    }
}
