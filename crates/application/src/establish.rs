use std::net::Ipv6Addr;
use std::sync::Arc;

use domain::common::entity::MacAddr;
use domain::conn::entity::{Host, Mapping, Node};
use domain::iface::entity::{DeviceId, InterfaceChain, InterfaceKind};
use ports::secondary::device_port::DevicePort;
use ports::secondary::identity_store::IdentityStorePort;
use ports::secondary::neighbor_port::NeighborPort;

/// Finds-or-creates Node (link-layer), Host (network) and Mapping
/// (network+transport) records for one side of a connection.
///
/// All creation is double-checked through the store's commit calls so
/// concurrent packets for the same new flow converge on one record;
/// losers discard their candidates without touching shared state.
pub struct IdentityEstablisher {
    identities: Arc<dyn IdentityStorePort>,
    devices: Arc<dyn DevicePort>,
    neighbors: Arc<dyn NeighborPort>,
}

impl IdentityEstablisher {
    pub fn new(
        identities: Arc<dyn IdentityStorePort>,
        devices: Arc<dyn DevicePort>,
        neighbors: Arc<dyn NeighborPort>,
    ) -> Self {
        Self {
            identities,
            devices,
            neighbors,
        }
    }

    /// Select the node address for a host reached through this chain.
    ///
    /// Walks the chain outermost-first: the first interface type that
    /// can pin a link-layer identity wins. `None` means resolution is
    /// pending (a solicitation may have been kicked) and the caller
    /// retries on a later packet.
    fn select_node_mac(
        &self,
        device: DeviceId,
        addr: &Ipv6Addr,
        chain: &InterfaceChain,
        given: Option<MacAddr>,
    ) -> Option<MacAddr> {
        if let Some(mac) = given {
            return Some(mac);
        }

        let mut node_mac = MacAddr::ZERO;
        for iface in chain.iter_outer_to_inner() {
            match &iface.kind {
                InterfaceKind::Pppoe(info) => {
                    // Normal neighbor resolution cannot run over the
                    // session; the remote server's address is the node.
                    return Some(info.remote_mac);
                }
                InterfaceKind::Sit | InterfaceKind::Tunipip6 => {
                    // Tunnel legs have no station address of their own.
                    return Some(node_mac);
                }
                InterfaceKind::Ethernet { .. }
                | InterfaceKind::Lag { .. }
                | InterfaceKind::Vlan(_)
                | InterfaceKind::Bridge { .. } => {
                    let Some(mac) = self.neighbors.lookup(addr) else {
                        let solicit_dev = self.devices.master_of(device).unwrap_or(device);
                        self.neighbors.solicit(solicit_dev, addr);
                        tracing::trace!(%addr, "neighbor pending for node");
                        return None;
                    };
                    if mac.is_multicast() {
                        tracing::trace!(%addr, %mac, "multicast node address rejected");
                        return None;
                    }
                    return Some(mac);
                }
                _ => {
                    // Best effort: keep scanning inward with a
                    // placeholder derived from the address.
                    node_mac = MacAddr::from_addr_bytes(addr);
                }
            }
        }
        None
    }

    pub fn establish_node(
        &self,
        device: DeviceId,
        addr: &Ipv6Addr,
        chain: &InterfaceChain,
        given: Option<MacAddr>,
    ) -> Option<Arc<Node>> {
        let mac = self.select_node_mac(device, addr, chain, given)?;

        if let Some(node) = self.identities.node_find(&mac) {
            return Some(node);
        }
        let candidate = Arc::new(Node { mac });
        Some(self.identities.node_commit(candidate))
    }

    pub fn establish_host(
        &self,
        device: DeviceId,
        addr: &Ipv6Addr,
        chain: &InterfaceChain,
        given: Option<MacAddr>,
    ) -> Option<Arc<Host>> {
        if let Some(host) = self.identities.host_find(addr) {
            return Some(host);
        }
        let node = self.establish_node(device, addr, chain, given)?;
        let candidate = Arc::new(Host { addr: *addr, node });
        Some(self.identities.host_commit(candidate))
    }

    pub fn establish_mapping(
        &self,
        device: DeviceId,
        addr: &Ipv6Addr,
        port: i32,
        chain: &InterfaceChain,
        given: Option<MacAddr>,
    ) -> Option<Arc<Mapping>> {
        let host = self.establish_host(device, addr, chain, given)?;

        if let Some(mapping) = self.identities.mapping_find(addr, port) {
            return Some(mapping);
        }
        let candidate = Arc::new(Mapping {
            addr: *addr,
            port,
            host,
        });
        Some(self.identities.mapping_commit(candidate))
    }
}
