use std::collections::{HashMap, HashSet};
use std::net::Ipv6Addr;
use std::sync::Mutex;

use domain::common::entity::MacAddr;
use domain::iface::entity::DeviceId;
use ports::secondary::device_port::{DeviceDescriptor, DevicePort, LinkKind};
use ports::secondary::neighbor_port::NeighborPort;
use ports::secondary::route_port::{RoutePort, RouteTarget};

#[derive(Default)]
struct Inner {
    devices: HashMap<DeviceId, DeviceDescriptor>,
    routes: HashMap<Ipv6Addr, RouteTarget>,
    neighbors: HashMap<Ipv6Addr, MacAddr>,
    bridge_fdb: HashMap<(DeviceId, MacAddr), DeviceId>,
    lag_slaves: HashMap<DeviceId, Vec<DeviceId>>,
    masters: HashMap<DeviceId, DeviceId>,
    carrier_down: HashSet<DeviceId>,
    solicited: Vec<(DeviceId, Ipv6Addr)>,
}

/// A programmable device/route/neighbor view of the system, standing
/// in for the kernel's tables. Serves the loopback deployment and the
/// integration tests, which assemble topologies with the `add_*`
/// calls and assert on issued solicitations.
pub struct SimNetwork {
    inner: Mutex<Inner>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn add_device(&self, descriptor: DeviceDescriptor) {
        let mut inner = self.inner.lock().expect("netsim lock poisoned");
        if let LinkKind::Vlan { underlying, .. } | LinkKind::PppoeSession { underlying, .. } =
            &descriptor.link
        {
            inner.masters.insert(descriptor.id, *underlying);
        }
        inner.devices.insert(descriptor.id, descriptor);
    }

    pub fn add_route(&self, addr: Ipv6Addr, device: DeviceId, from_local: bool) {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .routes
            .insert(addr, RouteTarget { device, from_local });
    }

    pub fn add_neighbor(&self, addr: Ipv6Addr, mac: MacAddr) {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .neighbors
            .insert(addr, mac);
    }

    pub fn forget_neighbor(&self, addr: &Ipv6Addr) {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .neighbors
            .remove(addr);
    }

    pub fn add_bridge_station(&self, bridge: DeviceId, mac: MacAddr, port: DeviceId) {
        let mut inner = self.inner.lock().expect("netsim lock poisoned");
        inner.bridge_fdb.insert((bridge, mac), port);
        inner.masters.insert(port, bridge);
    }

    pub fn add_lag(&self, master: DeviceId, slaves: Vec<DeviceId>) {
        let mut inner = self.inner.lock().expect("netsim lock poisoned");
        for slave in &slaves {
            inner.masters.insert(*slave, master);
        }
        inner.lag_slaves.insert(master, slaves);
    }

    pub fn set_carrier(&self, device: DeviceId, up: bool) {
        let mut inner = self.inner.lock().expect("netsim lock poisoned");
        if up {
            inner.carrier_down.remove(&device);
        } else {
            inner.carrier_down.insert(device);
        }
    }

    /// Solicitations issued so far, oldest first.
    pub fn solicited(&self) -> Vec<(DeviceId, Ipv6Addr)> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .solicited
            .clone()
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutePort for SimNetwork {
    fn device_for_addr(&self, addr: &Ipv6Addr) -> Option<RouteTarget> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .routes
            .get(addr)
            .copied()
    }
}

impl DevicePort for SimNetwork {
    fn describe(&self, device: DeviceId) -> Option<DeviceDescriptor> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .devices
            .get(&device)
            .cloned()
    }

    fn bridge_port_for(&self, bridge: DeviceId, mac: &MacAddr) -> Option<DeviceId> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .bridge_fdb
            .get(&(bridge, *mac))
            .copied()
    }

    fn lag_tx_slave(
        &self,
        master: DeviceId,
        src_mac: &MacAddr,
        dst_mac: &MacAddr,
    ) -> Option<DeviceId> {
        let inner = self.inner.lock().expect("netsim lock poisoned");
        let slaves = inner.lag_slaves.get(&master)?;
        if slaves.is_empty() {
            return None;
        }
        // Same shape as a transmit hash: stable for one address pair.
        let hash = src_mac
            .octets()
            .iter()
            .chain(dst_mac.octets().iter())
            .fold(0usize, |acc, b| acc.wrapping_add(usize::from(*b)));
        Some(slaves[hash % slaves.len()])
    }

    fn carrier_ok(&self, device: DeviceId) -> bool {
        !self
            .inner
            .lock()
            .expect("netsim lock poisoned")
            .carrier_down
            .contains(&device)
    }

    fn master_of(&self, device: DeviceId) -> Option<DeviceId> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .masters
            .get(&device)
            .copied()
    }
}

impl NeighborPort for SimNetwork {
    fn lookup(&self, addr: &Ipv6Addr) -> Option<MacAddr> {
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .neighbors
            .get(addr)
            .copied()
    }

    fn solicit(&self, device: DeviceId, addr: &Ipv6Addr) {
        tracing::trace!(%device, %addr, "neighbor solicitation");
        self.inner
            .lock()
            .expect("netsim lock poisoned")
            .solicited
            .push((device, *addr));
    }
}
