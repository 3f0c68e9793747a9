use std::net::Ipv6Addr;

use domain::iface::entity::DeviceId;

/// What a route lookup resolved an address to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTarget {
    pub device: DeviceId,
    /// The address is local to this device (tunnel endpoints care).
    pub from_local: bool,
}

/// Secondary port over the routing table.
pub trait RoutePort: Send + Sync {
    fn device_for_addr(&self, addr: &Ipv6Addr) -> Option<RouteTarget>;
}
