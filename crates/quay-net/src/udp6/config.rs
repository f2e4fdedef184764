//! Configuration types for UDP/IPv6 sockets.

use serde::{Deserialize, Serialize};

/// Default receive buffer size in bytes.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 131_072;

/// Default hop limit for both unicast and multicast datagrams.
pub const DEFAULT_HOP_LIMIT: u8 = 64;

/// Multicast interface value meaning "let the stack choose".
pub const MULTICAST_IF_DEFAULT: i32 = -1;

/// Transport and IP options of a UDP/IPv6 socket.
///
/// Every option can be read and written in any socket state. Changes apply to
/// subsequent operations only: lowering the receive buffer does not evict
/// queued datagrams, and changing the multicast interface does not move
/// existing group memberships.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Udp6SocketConfig {
    /// Admission ceiling for the delivery queue, in bytes.
    pub recv_buffer_size: usize,
    /// Hop limit stamped on outgoing unicast datagrams.
    pub ip_ttl: u8,
    /// Hop limit stamped on outgoing multicast datagrams.
    pub ip_multicast_ttl: u8,
    /// Egress interface index for multicast sends. `-1` selects the stack default.
    pub ip_multicast_if: i32,
    /// Deliver locally-sent multicast back to group members on this host.
    pub ip_multicast_loop: bool,
    /// Reject datagrams that exceed the path MTU instead of fragmenting.
    pub mtu_discover: bool,
    /// Accept broadcast-class destinations in `send_to`.
    pub allow_broadcast: bool,
}

impl Default for Udp6SocketConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            ip_ttl: DEFAULT_HOP_LIMIT,
            ip_multicast_ttl: DEFAULT_HOP_LIMIT,
            ip_multicast_if: MULTICAST_IF_DEFAULT,
            ip_multicast_loop: false,
            mtu_discover: false,
            allow_broadcast: false,
        }
    }
}

impl Udp6SocketConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the unicast hop limit.
    pub fn ip_ttl(mut self, ttl: u8) -> Self {
        self.ip_ttl = ttl;
        self
    }

    /// Set the multicast hop limit.
    pub fn ip_multicast_ttl(mut self, ttl: u8) -> Self {
        self.ip_multicast_ttl = ttl;
        self
    }

    /// Select the multicast egress interface.
    pub fn ip_multicast_if(mut self, index: i32) -> Self {
        self.ip_multicast_if = index;
        self
    }

    /// Enable or disable multicast loopback.
    pub fn ip_multicast_loop(mut self, enabled: bool) -> Self {
        self.ip_multicast_loop = enabled;
        self
    }

    /// Enable or disable path MTU discovery.
    pub fn mtu_discover(mut self, enabled: bool) -> Self {
        self.mtu_discover = enabled;
        self
    }

    /// Enable or disable broadcast destinations.
    pub fn allow_broadcast(mut self, enabled: bool) -> Self {
        self.allow_broadcast = enabled;
        self
    }

    /// The configured multicast interface, or `None` for the stack default.
    pub fn multicast_interface(&self) -> Option<u32> {
        u32::try_from(self.ip_multicast_if).ok()
    }

    /// Read an option by name.
    pub fn get(&self, name: SocketOptionName) -> SocketOption {
        match name {
            SocketOptionName::RecvBufferSize => SocketOption::RecvBufferSize(self.recv_buffer_size),
            SocketOptionName::IpTtl => SocketOption::IpTtl(self.ip_ttl),
            SocketOptionName::IpMulticastTtl => SocketOption::IpMulticastTtl(self.ip_multicast_ttl),
            SocketOptionName::IpMulticastIf => SocketOption::IpMulticastIf(self.ip_multicast_if),
            SocketOptionName::IpMulticastLoop => {
                SocketOption::IpMulticastLoop(self.ip_multicast_loop)
            }
            SocketOptionName::MtuDiscover => SocketOption::MtuDiscover(self.mtu_discover),
            SocketOptionName::AllowBroadcast => SocketOption::AllowBroadcast(self.allow_broadcast),
        }
    }

    /// Write a single option.
    pub fn set(&mut self, option: SocketOption) {
        match option {
            SocketOption::RecvBufferSize(v) => self.recv_buffer_size = v,
            SocketOption::IpTtl(v) => self.ip_ttl = v,
            SocketOption::IpMulticastTtl(v) => self.ip_multicast_ttl = v,
            SocketOption::IpMulticastIf(v) => self.ip_multicast_if = v,
            SocketOption::IpMulticastLoop(v) => self.ip_multicast_loop = v,
            SocketOption::MtuDiscover(v) => self.mtu_discover = v,
            SocketOption::AllowBroadcast(v) => self.allow_broadcast = v,
        }
    }
}

/// Names of the configurable socket options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketOptionName {
    /// Receive buffer size in bytes.
    RecvBufferSize,
    /// Unicast hop limit.
    IpTtl,
    /// Multicast hop limit.
    IpMulticastTtl,
    /// Multicast egress interface.
    IpMulticastIf,
    /// Multicast loopback.
    IpMulticastLoop,
    /// Path MTU discovery.
    MtuDiscover,
    /// Broadcast permission.
    AllowBroadcast,
}

impl SocketOptionName {
    /// All option names, in declaration order.
    pub const ALL: [SocketOptionName; 7] = [
        Self::RecvBufferSize,
        Self::IpTtl,
        Self::IpMulticastTtl,
        Self::IpMulticastIf,
        Self::IpMulticastLoop,
        Self::MtuDiscover,
        Self::AllowBroadcast,
    ];
}

impl std::fmt::Display for SocketOptionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RecvBufferSize => "RcvBufSize",
            Self::IpTtl => "IpTtl",
            Self::IpMulticastTtl => "IpMulticastTtl",
            Self::IpMulticastIf => "IpMulticastIf",
            Self::IpMulticastLoop => "IpMulticastLoop",
            Self::MtuDiscover => "MtuDiscover",
            Self::AllowBroadcast => "AllowBroadcast",
        };
        f.write_str(name)
    }
}

/// A socket option together with its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketOption {
    /// Receive buffer size in bytes.
    RecvBufferSize(usize),
    /// Unicast hop limit.
    IpTtl(u8),
    /// Multicast hop limit.
    IpMulticastTtl(u8),
    /// Multicast egress interface, `-1` for the default.
    IpMulticastIf(i32),
    /// Multicast loopback.
    IpMulticastLoop(bool),
    /// Path MTU discovery.
    MtuDiscover(bool),
    /// Broadcast permission.
    AllowBroadcast(bool),
}

impl SocketOption {
    /// The name of this option.
    pub fn name(&self) -> SocketOptionName {
        match self {
            Self::RecvBufferSize(_) => SocketOptionName::RecvBufferSize,
            Self::IpTtl(_) => SocketOptionName::IpTtl,
            Self::IpMulticastTtl(_) => SocketOptionName::IpMulticastTtl,
            Self::IpMulticastIf(_) => SocketOptionName::IpMulticastIf,
            Self::IpMulticastLoop(_) => SocketOptionName::IpMulticastLoop,
            Self::MtuDiscover(_) => SocketOptionName::MtuDiscover,
            Self::AllowBroadcast(_) => SocketOptionName::AllowBroadcast,
        }
    }
}
