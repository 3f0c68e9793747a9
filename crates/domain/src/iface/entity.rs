use std::sync::Arc;

use crate::common::entity::MacAddr;

/// Maximum number of encapsulation layers a hierarchy may describe.
pub const HIERARCHY_MAX: usize = 10;

/// Kernel-side device identity used to key the shared interface table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub i32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// 802.1Q attributes of a VLAN layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanInfo {
    pub tag: u16,
    pub tpid: u16,
    /// Egress PCP folded into the rule's tag word.
    pub prio: u8,
    /// Address propagated down from the underlying device.
    pub mac: MacAddr,
}

impl VlanInfo {
    /// Full tag word as carried in the offload rule:
    /// TPID in the upper half, PCP in bits 13..15, VID in the low bits.
    pub fn tag_word(&self) -> u32 {
        (u32::from(self.tpid) << 16) | (u32::from(self.prio & 0x7) << 13) | u32::from(self.tag)
    }
}

/// PPPoE session attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PppoeInfo {
    pub session_id: u16,
    pub remote_mac: MacAddr,
}

/// One layer of an encapsulation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Ethernet { mac: MacAddr },
    Bridge { mac: MacAddr },
    Vlan(VlanInfo),
    Lag { mac: MacAddr },
    Pppoe(PppoeInfo),
    Sit,
    Tunipip6,
    IpsecTunnel,
    Loopback,
    Unknown,
}

impl InterfaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ethernet { .. } => "ethernet",
            Self::Bridge { .. } => "bridge",
            Self::Vlan(_) => "vlan",
            Self::Lag { .. } => "lag",
            Self::Pppoe(_) => "pppoe",
            Self::Sit => "sit",
            Self::Tunipip6 => "tunipip6",
            Self::IpsecTunnel => "ipsec",
            Self::Loopback => "loopback",
            Self::Unknown => "unknown",
        }
    }
}

/// Interface record shared through the interface table. Never owned by
/// a single connection; `Arc` handles replace manual reference counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub device: DeviceId,
    pub name: String,
    pub mtu: u32,
    /// Identifier the fast-path engine knows this interface by, if any.
    pub accel_id: Option<i32>,
    pub kind: InterfaceKind,
}

/// Ordered encapsulation stack for one side of a connection.
///
/// Slot 0 is the innermost physical device (the port the fast path
/// actually drives); the last slot is the outermost logical device the
/// routing decision produced (VLAN/PPPoE/bridge/tunnel).
#[derive(Debug, Clone, Default)]
pub struct InterfaceChain {
    list: Vec<Arc<Interface>>,
}

impl InterfaceChain {
    pub fn empty() -> Self {
        Self { list: Vec::new() }
    }

    /// Build a chain from interfaces collected while walking the stack
    /// outermost-first; the stored order is reversed so slot 0 is the
    /// innermost device.
    pub fn from_outer_walk(mut walked: Vec<Arc<Interface>>) -> Self {
        walked.reverse();
        Self { list: walked }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Innermost physical device.
    pub fn inner(&self) -> Option<&Arc<Interface>> {
        self.list.first()
    }

    /// Outermost logical device.
    pub fn outer(&self) -> Option<&Arc<Interface>> {
        self.list.last()
    }

    pub fn iter_inner_to_outer(&self) -> impl Iterator<Item = &Arc<Interface>> {
        self.list.iter()
    }

    pub fn iter_outer_to_inner(&self) -> impl Iterator<Item = &Arc<Interface>> {
        self.list.iter().rev()
    }
}
