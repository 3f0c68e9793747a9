use domain::common::entity::MacAddr;
use domain::iface::entity::{DeviceId, Interface, InterfaceKind, PppoeInfo, VlanInfo};

/// What kind of device this is, plus the topology link the hierarchy
/// walk needs to find the next device on the transmit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet { mac: MacAddr },
    Vlan { info: VlanInfo, underlying: DeviceId },
    Bridge { mac: MacAddr },
    Lag { mac: MacAddr },
    /// Single-channel PPPoE session.
    PppoeSession { info: PppoeInfo, underlying: DeviceId },
    /// Multilink or multi-channel PPP; opaque to the resolver.
    PppUnsupported,
    Sit,
    Tunipip6,
    IpsecTunnel,
    Loopback,
    Unknown,
}

/// Snapshot of one device's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub mtu: u32,
    /// Fast-path interface id, when the accelerator can drive this
    /// device directly.
    pub accel_id: Option<i32>,
    pub link: LinkKind,
}

impl DeviceDescriptor {
    /// Interface record to place in the shared table for this device.
    pub fn interface(&self) -> Interface {
        let kind = match &self.link {
            LinkKind::Ethernet { mac } => InterfaceKind::Ethernet { mac: *mac },
            LinkKind::Vlan { info, .. } => InterfaceKind::Vlan(*info),
            LinkKind::Bridge { mac } => InterfaceKind::Bridge { mac: *mac },
            LinkKind::Lag { mac } => InterfaceKind::Lag { mac: *mac },
            LinkKind::PppoeSession { info, .. } => InterfaceKind::Pppoe(*info),
            LinkKind::PppUnsupported | LinkKind::Unknown => InterfaceKind::Unknown,
            LinkKind::Sit => InterfaceKind::Sit,
            LinkKind::Tunipip6 => InterfaceKind::Tunipip6,
            LinkKind::IpsecTunnel => InterfaceKind::IpsecTunnel,
            LinkKind::Loopback => InterfaceKind::Loopback,
        };
        Interface {
            device: self.id,
            name: self.name.clone(),
            mtu: self.mtu,
            accel_id: self.accel_id,
            kind,
        }
    }
}

/// Secondary port over the device/topology view of the system.
pub trait DevicePort: Send + Sync {
    fn describe(&self, device: DeviceId) -> Option<DeviceDescriptor>;

    /// Which bridge port currently holds this station address.
    fn bridge_port_for(&self, bridge: DeviceId, mac: &MacAddr) -> Option<DeviceId>;

    /// Outbound aggregation slave for this addressing, per the
    /// master's transmit hash.
    fn lag_tx_slave(&self, master: DeviceId, src_mac: &MacAddr, dst_mac: &MacAddr)
    -> Option<DeviceId>;

    fn carrier_ok(&self, device: DeviceId) -> bool;

    /// Enslaving master (bridge) of a port device, if any.
    fn master_of(&self, device: DeviceId) -> Option<DeviceId>;
}
