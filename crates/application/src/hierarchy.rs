use std::net::Ipv6Addr;
use std::sync::Arc;

use domain::common::entity::{MacAddr, PROTO_IPIP};
use domain::iface::entity::{DeviceId, HIERARCHY_MAX, Interface, InterfaceChain};
use domain::iface::error::ResolveError;
use ports::secondary::device_port::{DevicePort, LinkKind};
use ports::secondary::interface_store::InterfaceStorePort;
use ports::secondary::neighbor_port::NeighborPort;
use ports::secondary::route_port::RoutePort;

/// Addressing and hints for one hierarchy construction.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyRequest {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub protocol: u8,
    pub given_dest: Option<DeviceId>,
    pub given_src: Option<DeviceId>,
    pub is_routed: bool,
    /// Link-layer addresses from the packet, known on bridged paths.
    pub dst_node_mac: Option<MacAddr>,
    pub src_node_mac: Option<MacAddr>,
}

/// Walks a device's encapsulation stack to discover the ordered chain
/// of interfaces a packet transits to reach the destination address,
/// kicking neighbor solicitation whenever link-layer addressing is
/// still unresolved.
///
/// Interfaces are established into the shared table as they are
/// discovered; a failed walk simply drops its `Arc` handles, so a
/// retry on the next packet starts clean.
pub struct HierarchyResolver {
    routes: Arc<dyn RoutePort>,
    devices: Arc<dyn DevicePort>,
    neighbors: Arc<dyn NeighborPort>,
    interfaces: Arc<dyn InterfaceStorePort>,
}

impl HierarchyResolver {
    pub fn new(
        routes: Arc<dyn RoutePort>,
        devices: Arc<dyn DevicePort>,
        neighbors: Arc<dyn NeighborPort>,
        interfaces: Arc<dyn InterfaceStorePort>,
    ) -> Self {
        Self {
            routes,
            devices,
            neighbors,
            interfaces,
        }
    }

    /// Resolve the device a side's address maps to. Routed traffic
    /// tries the route table first and falls back to the hint; bridged
    /// traffic prefers the hint.
    fn resolve_side(
        &self,
        addr: &Ipv6Addr,
        given: Option<DeviceId>,
        is_routed: bool,
        protocol: u8,
    ) -> Option<DeviceId> {
        let (device, from_local) = if is_routed {
            match self.routes.device_for_addr(addr) {
                Some(target) => (Some(target.device), target.from_local),
                None => (given, false),
            }
        } else if given.is_some() {
            (given, false)
        } else {
            match self.routes.device_for_addr(addr) {
                Some(target) => (Some(target.device), target.from_local),
                None => (None, false),
            }
        };

        // A local address under an IP-in-IP protocol means the packet
        // targets a tunnel endpoint on this box; routing points at the
        // wrong device, so the hint wins.
        if from_local && protocol == PROTO_IPIP {
            return given;
        }
        device
    }

    pub fn construct(&self, req: &HierarchyRequest) -> Result<InterfaceChain, ResolveError> {
        let dest_dev = self
            .resolve_side(&req.dst_addr, req.given_dest, req.is_routed, req.protocol)
            .ok_or(ResolveError::NoRoute(req.dst_addr))?;
        let src_dev = self
            .resolve_side(&req.src_addr, req.given_src, req.is_routed, req.protocol)
            .ok_or(ResolveError::NoRoute(req.src_addr))?;

        // Tunnel traffic seen from the input hook resolves both sides
        // to the tunnel device itself; there is no forwarding
        // hierarchy to record for that.
        if src_dev == dest_dev && req.protocol == PROTO_IPIP {
            tracing::trace!(device = %dest_dev, "same-device tunnel endpoint");
            return Err(ResolveError::TunnelEndpoint);
        }

        let mut walked: Vec<Arc<Interface>> = Vec::new();
        let mut current = dest_dev;

        loop {
            if walked.len() == HIERARCHY_MAX {
                tracing::warn!(depth = walked.len(), "hierarchy too deep");
                return Err(ResolveError::DepthExceeded);
            }

            let descriptor = self
                .devices
                .describe(current)
                .ok_or(ResolveError::UnknownDevice(current))?;
            walked.push(self.interfaces.establish(descriptor.interface()));

            let next = match &descriptor.link {
                LinkKind::Vlan { underlying, .. } => Some(*underlying),

                LinkKind::Bridge { .. } => {
                    // The port the packet leaves through depends on the
                    // destination's station address.
                    let mac = match self.neighbors.lookup(&req.dst_addr) {
                        Some(mac) => mac,
                        None => {
                            self.neighbors.solicit(current, &req.dst_addr);
                            return Err(ResolveError::NeighborUnresolved(req.dst_addr));
                        }
                    };
                    let port = self
                        .devices
                        .bridge_port_for(current, &mac)
                        .ok_or(ResolveError::BridgePortUnknown(mac))?;
                    Some(port)
                }

                LinkKind::Lag { mac: master_mac } => {
                    let (src_mac, dst_mac) = if req.is_routed {
                        let dst_mac = match self.neighbors.lookup(&req.dst_addr) {
                            Some(mac) => mac,
                            None => {
                                let solicit_dev =
                                    self.devices.master_of(current).unwrap_or(current);
                                self.neighbors.solicit(solicit_dev, &req.dst_addr);
                                return Err(ResolveError::NeighborUnresolved(req.dst_addr));
                            }
                        };
                        (*master_mac, dst_mac)
                    } else {
                        (
                            req.src_node_mac.unwrap_or(MacAddr::ZERO),
                            req.dst_node_mac.unwrap_or(MacAddr::ZERO),
                        )
                    };

                    let slave = self
                        .devices
                        .lag_tx_slave(current, &src_mac, &dst_mac)
                        .filter(|slave| self.devices.carrier_ok(*slave))
                        .ok_or(ResolveError::LinkDown(current))?;
                    Some(slave)
                }

                LinkKind::PppoeSession { underlying, .. } => Some(*underlying),

                // No further device on the transmit path.
                LinkKind::Ethernet { .. }
                | LinkKind::PppUnsupported
                | LinkKind::Sit
                | LinkKind::Tunipip6
                | LinkKind::IpsecTunnel
                | LinkKind::Loopback
                | LinkKind::Unknown => None,
            };

            match next {
                Some(device) => current = device,
                None => break,
            }
        }

        tracing::trace!(depth = walked.len(), "hierarchy constructed");
        Ok(InterfaceChain::from_outer_walk(walked))
    }
}
