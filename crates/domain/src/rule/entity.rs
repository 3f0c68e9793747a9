use crate::common::entity::{DscpMarking, FlowTuple, MacAddr, QosTags};
use crate::conn::entity::TcpWindowSnapshot;
use crate::iface::entity::PppoeInfo;

/// Marker for an unpopulated VLAN slot in the rule.
pub const VLAN_TAG_NOT_CONFIGURED: u32 = 0xffff_ffff;

/// Fast-path interface id used when an IPsec boundary keeps the flow
/// on-chip instead of leaving through a port.
pub const SAME_CHIP_INTERFACE: i32 = 62;

/// Ingress/egress tag words for one VLAN nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanPair {
    pub ingress: u32,
    pub egress: u32,
}

impl Default for VlanPair {
    fn default() -> Self {
        Self {
            ingress: VLAN_TAG_NOT_CONFIGURED,
            egress: VLAN_TAG_NOT_CONFIGURED,
        }
    }
}

impl VlanPair {
    pub fn is_configured(&self) -> bool {
        self.ingress != VLAN_TAG_NOT_CONFIGURED || self.egress != VLAN_TAG_NOT_CONFIGURED
    }
}

/// One flat offload rule describing a flow's entire forwarding context.
///
/// Built fresh for every acceleration attempt and discarded after
/// submission; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadRule {
    pub tuple: FlowTuple,

    /// Fast-path interface ids for each direction.
    pub flow_interface: i32,
    pub return_interface: i32,

    /// Node (next/prev hop) link-layer addresses.
    pub flow_mac: MacAddr,
    pub return_mac: MacAddr,

    /// Interface-level addresses discovered while walking each stack.
    pub flow_iface_mac: MacAddr,
    pub return_iface_mac: MacAddr,

    pub flow_mtu: u32,
    pub return_mtu: u32,

    pub routed: bool,

    pub vlan_primary: VlanPair,
    pub vlan_secondary: VlanPair,

    pub flow_pppoe: Option<PppoeInfo>,
    pub return_pppoe: Option<PppoeInfo>,

    pub qos: QosTags,
    pub dscp: Option<DscpMarking>,

    pub tcp: Option<TcpWindowSnapshot>,
    /// Ask the fast path not to enforce sequence-space checks.
    pub no_seq_check: bool,
}

impl OffloadRule {
    pub fn has_vlan(&self) -> bool {
        self.vlan_primary.is_configured() || self.vlan_secondary.is_configured()
    }

    pub fn has_pppoe(&self) -> bool {
        self.flow_pppoe.is_some() || self.return_pppoe.is_some()
    }
}
