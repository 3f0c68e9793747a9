use std::net::Ipv6Addr;

use domain::common::entity::MacAddr;
use domain::iface::entity::DeviceId;

/// Secondary port over the neighbor (ND) table.
///
/// Lookups never block: an unresolved neighbor fails the calling
/// packet's attempt, and `solicit` kicks resolution so a later packet
/// can succeed.
pub trait NeighborPort: Send + Sync {
    fn lookup(&self, addr: &Ipv6Addr) -> Option<MacAddr>;

    /// Issue a neighbor solicitation on the given device.
    fn solicit(&self, device: DeviceId, addr: &Ipv6Addr);

    /// Keep an entry fresh while traffic bypasses the slow path.
    fn refresh(&self, _addr: &Ipv6Addr) {}
}
