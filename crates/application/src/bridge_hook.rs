use domain::common::entity::MacAddr;
use domain::iface::entity::DeviceId;
use ports::secondary::device_port::{DevicePort, LinkKind};

/// Ethertype of IPv6 over Ethernet.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

/// What the bridge hook saw for one frame leaving a bridge port.
#[derive(Debug, Clone, Copy)]
pub struct BridgeFrame {
    /// The bridge port the frame is leaving through.
    pub out_port: DeviceId,
    /// Device the frame entered the system on, when known. Locally
    /// sourced traffic has none.
    pub in_device: Option<DeviceId>,
    pub eth_src: MacAddr,
    pub eth_dst: MacAddr,
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeVerdict {
    /// Bridged from another port; process with this input port.
    Process { in_port: DeviceId },
    /// Not ours: local, routed, bounced, or not IPv6.
    Ignore(&'static str),
}

/// Decide whether a frame leaving a bridge port is bridged traffic
/// this manager should see.
///
/// Three cases arrive here: locally sourced frames (no input device),
/// routed frames (source address is the bridge's own), and frames
/// bridged from another port. Only the last is processed; routed
/// traffic is handled by the routing hook.
pub fn classify_bridge_frame(devices: &dyn DevicePort, frame: &BridgeFrame) -> BridgeVerdict {
    if frame.ethertype != ETHERTYPE_IPV6 {
        return BridgeVerdict::Ignore("not ipv6");
    }

    let Some(bridge) = devices.master_of(frame.out_port) else {
        return BridgeVerdict::Ignore("not a bridge port");
    };

    if frame.in_device.is_none() {
        return BridgeVerdict::Ignore("local source");
    }

    let Some(in_port) = devices.bridge_port_for(bridge, &frame.eth_src) else {
        return BridgeVerdict::Ignore("unknown source station");
    };
    if in_port == frame.out_port {
        return BridgeVerdict::Ignore("port bounce");
    }

    if let Some(descriptor) = devices.describe(bridge)
        && let LinkKind::Bridge { mac } = descriptor.link
        && mac == frame.eth_src
    {
        // Routed over the bridge; the routing hook owns it.
        return BridgeVerdict::Ignore("routed");
    }

    BridgeVerdict::Process { in_port }
}
