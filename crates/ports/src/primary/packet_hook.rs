use std::net::Ipv6Addr;

use domain::common::entity::{MacAddr, PacketView};
use domain::iface::entity::DeviceId;

/// Parsed layer-3/4 header of the packet at hand.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Header {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub fragmented: bool,
}

/// Everything the packet hook hands to the dispatcher for one packet.
#[derive(Debug, Clone, Copy)]
pub struct PacketMeta {
    pub in_device: DeviceId,
    pub out_device: DeviceId,
    /// Link-layer addresses, known only on the bridged path.
    pub src_link_addr: Option<MacAddr>,
    pub dst_link_addr: Option<MacAddr>,
    pub can_accel: bool,
    pub is_routed: bool,
    pub header: Ipv6Header,
    pub view: PacketView,
}

/// The dispatcher never itself drops at the network layer beyond its
/// own policy decision; it always signals the hook framework to keep
/// the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Accept,
}

/// Primary port: the routing/bridging packet hook calls this for every
/// forwarded packet.
pub trait PacketHookPort: Send + Sync {
    fn process(&self, packet: &PacketMeta) -> HookAction;
}
