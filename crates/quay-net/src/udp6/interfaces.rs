//! A fixed interface set implementing [`InterfaceResolver`].

use std::collections::HashMap;
use std::net::Ipv6Addr;

use parking_lot::{Mutex, RwLock};
use quay_core::logging::targets;

use super::endpoint::InterfaceResolver;
use crate::Result;
use crate::error::SocketError;

/// Default Ethernet MTU.
pub const DEFAULT_MTU: u32 = 1500;

/// One network interface and its addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    /// Interface index (never 0).
    pub index: u32,
    /// Human-readable name.
    pub name: String,
    /// Assigned IPv6 addresses, in preference order.
    pub addresses: Vec<Ipv6Addr>,
    /// Link MTU in bytes.
    pub mtu: u32,
    /// Whether this is the loopback interface.
    pub is_loopback: bool,
}

impl Interface {
    /// Create an interface with no addresses and the default MTU.
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            addresses: Vec::new(),
            mtu: DEFAULT_MTU,
            is_loopback: false,
        }
    }

    /// The loopback interface carrying `::1`.
    pub fn loopback(index: u32) -> Self {
        Self {
            index,
            name: "lo".into(),
            addresses: vec![Ipv6Addr::LOCALHOST],
            mtu: 65536,
            is_loopback: true,
        }
    }

    /// Add an address.
    pub fn address(mut self, addr: Ipv6Addr) -> Self {
        self.addresses.push(addr);
        self
    }

    /// Set the link MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    fn preferred_source(&self, destination: &Ipv6Addr) -> Option<Ipv6Addr> {
        let link_scope = destination.is_multicast() || destination.is_unicast_link_local();
        self.addresses
            .iter()
            .find(|a| a.is_unicast_link_local() == link_scope)
            .or_else(|| self.addresses.first())
            .copied()
    }
}

/// Reference [`InterfaceResolver`] over a configurable interface list.
///
/// Group joins are reference counted per (interface, group) so several
/// sockets on the same node can share a membership.
#[derive(Debug, Default)]
pub struct StaticInterfaces {
    interfaces: RwLock<Vec<Interface>>,
    default_multicast: RwLock<Option<u32>>,
    groups: Mutex<HashMap<(u32, Ipv6Addr), usize>>,
}

impl StaticInterfaces {
    /// Create an empty interface set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface (builder form).
    pub fn with_interface(self, interface: Interface) -> Self {
        self.add_interface(interface);
        self
    }

    /// Add or replace an interface.
    pub fn add_interface(&self, interface: Interface) {
        let mut interfaces = self.interfaces.write();
        interfaces.retain(|i| i.index != interface.index);
        tracing::debug!(target: targets::INTERFACES, index = interface.index, name = %interface.name, "interface added");
        interfaces.push(interface);
    }

    /// Remove an interface. Returns `false` if it did not exist.
    pub fn remove_interface(&self, index: u32) -> bool {
        let mut interfaces = self.interfaces.write();
        let before = interfaces.len();
        interfaces.retain(|i| i.index != index);
        before != interfaces.len()
    }

    /// Choose the interface used for multicast when a socket names none.
    pub fn set_default_multicast_interface(&self, index: Option<u32>) {
        *self.default_multicast.write() = index;
    }

    /// Whether any socket holds membership of `group` on `index`.
    pub fn is_member(&self, index: u32, group: &Ipv6Addr) -> bool {
        self.groups.lock().contains_key(&(index, *group))
    }

    /// Current memberships as (interface, group, reference count).
    pub fn memberships(&self) -> Vec<(u32, Ipv6Addr, usize)> {
        let mut all: Vec<_> = self
            .groups
            .lock()
            .iter()
            .map(|(&(index, group), &count)| (index, group, count))
            .collect();
        all.sort();
        all
    }

    fn resolve_group_interface(&self, index: u32) -> Result<u32> {
        if index == 0 {
            return self.default_multicast_interface().ok_or(SocketError::NetworkUnreachable);
        }
        if !self.has_interface(index) {
            return Err(SocketError::InvalidArgument);
        }
        Ok(index)
    }
}

impl InterfaceResolver for StaticInterfaces {
    fn is_local_address(&self, addr: &Ipv6Addr) -> bool {
        self.interfaces.read().iter().any(|i| i.addresses.contains(addr))
    }

    fn has_interface(&self, index: u32) -> bool {
        self.interfaces.read().iter().any(|i| i.index == index)
    }

    fn route(&self, destination: &Ipv6Addr, interface: Option<u32>) -> Option<(Ipv6Addr, u32)> {
        let interfaces = self.interfaces.read();

        if let Some(index) = interface {
            let iface = interfaces.iter().find(|i| i.index == index)?;
            return iface.preferred_source(destination).map(|src| (src, iface.index));
        }

        let local = destination.is_loopback() || interfaces.iter().any(|i| i.addresses.contains(destination));
        if local && let Some(lo) = interfaces.iter().find(|i| i.is_loopback) {
            let source = if destination.is_loopback() { Ipv6Addr::LOCALHOST } else { *destination };
            return Some((source, lo.index));
        }

        interfaces
            .iter()
            .filter(|i| !i.is_loopback)
            .find_map(|i| i.preferred_source(destination).map(|src| (src, i.index)))
    }

    fn default_multicast_interface(&self) -> Option<u32> {
        if let Some(index) = *self.default_multicast.read() {
            return Some(index);
        }
        self.interfaces
            .read()
            .iter()
            .find(|i| !i.is_loopback)
            .map(|i| i.index)
    }

    fn mtu(&self, index: u32) -> Option<u32> {
        self.interfaces.read().iter().find(|i| i.index == index).map(|i| i.mtu)
    }

    fn join_group(&self, index: u32, group: &Ipv6Addr) -> Result<()> {
        let resolved = self.resolve_group_interface(index)?;
        let mut groups = self.groups.lock();
        let count = groups.entry((resolved, *group)).or_insert(0);
        *count += 1;
        tracing::debug!(target: targets::INTERFACES, %group, index = resolved, refs = *count, "group joined");
        Ok(())
    }

    fn leave_group(&self, index: u32, group: &Ipv6Addr) -> Result<()> {
        let resolved = self.resolve_group_interface(index)?;
        let mut groups = self.groups.lock();
        let Some(count) = groups.get_mut(&(resolved, *group)) else {
            return Err(SocketError::MulticastMembershipConflict);
        };
        *count -= 1;
        if *count == 0 {
            groups.remove(&(resolved, *group));
            tracing::debug!(target: targets::INTERFACES, %group, index = resolved, "group left");
        }
        Ok(())
    }
}

static_assertions::assert_impl_all!(StaticInterfaces: Send, Sync);
