use crate::classifier::entity::AggregateVerdict;
use crate::common::entity::{FlowTuple, MacAddr, ProtoClass};
use crate::conn::entity::{TcpState, TcpWindowSnapshot};
use crate::iface::entity::{InterfaceChain, InterfaceKind, PppoeInfo};

use super::entity::{OffloadRule, SAME_CHIP_INTERFACE, VLAN_TAG_NOT_CONFIGURED, VlanPair};
use super::error::RuleError;

/// Build-time knobs that do not vary per connection.
#[derive(Debug, Clone, Copy)]
pub struct RuleSettings {
    /// Interface id substituted when an IPsec boundary is on the path.
    pub same_chip_interface: i32,
    /// Global liberal-window mode: disable sequence checking for every
    /// TCP rule.
    pub tcp_liberal: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            same_chip_interface: SAME_CHIP_INTERFACE,
            tcp_liberal: false,
        }
    }
}

/// Everything the builder needs from the connection.
#[derive(Debug)]
pub struct RuleInputs<'a> {
    pub tuple: FlowTuple,
    pub routed: bool,
    pub from_chain: &'a InterfaceChain,
    pub to_chain: &'a InterfaceChain,
    pub from_node_mac: MacAddr,
    pub to_node_mac: MacAddr,
    /// Tracked window state; absent for non-TCP flows or when the flow
    /// is not tracked at all.
    pub tcp: Option<&'a TcpState>,
}

/// Fields one side's stack walk contributes to the rule.
#[derive(Debug, Default)]
struct SideFields {
    mac: MacAddr,
    vlan_primary: Option<u32>,
    vlan_secondary: Option<u32>,
    pppoe: Option<PppoeInfo>,
    same_chip: bool,
}

/// Walk one stack innermost-first, accumulating per-type contributions
/// and enforcing cardinality: one bridge, two stacked VLANs, one PPPoE
/// session, one IPsec boundary. Unrecognized layers are skipped.
fn collect_side(chain: &InterfaceChain, side: &'static str) -> Result<SideFields, RuleError> {
    if chain.is_empty() {
        return Err(RuleError::EmptyChain(side));
    }

    let mut fields = SideFields::default();
    let mut bridges = 0u32;
    let mut ethernets = 0u32;
    let mut vlans = 0u32;
    let mut pppoe = 0u32;
    let mut ipsec = 0u32;

    for iface in chain.iter_inner_to_outer() {
        match &iface.kind {
            InterfaceKind::Bridge { mac } => {
                if bridges != 0 {
                    return Err(RuleError::CascadedBridge);
                }
                bridges += 1;
                if ethernets == 0 {
                    fields.mac = *mac;
                }
            }
            InterfaceKind::Ethernet { mac } => {
                // Repeats are address propagation artifacts from
                // bridges down to their ports; only the first counts.
                if ethernets == 0 {
                    fields.mac = *mac;
                }
                ethernets += 1;
            }
            InterfaceKind::Vlan(info) => {
                match vlans {
                    0 => fields.vlan_primary = Some(info.tag_word()),
                    1 => fields.vlan_secondary = Some(info.tag_word()),
                    _ => return Err(RuleError::VlanDepth),
                }
                vlans += 1;
                if ethernets == 0 {
                    // Address propagated onto the VLAN device stands in
                    // until a real port address shows up.
                    fields.mac = info.mac;
                    ethernets += 1;
                }
            }
            InterfaceKind::Pppoe(info) => {
                if pppoe != 0 {
                    return Err(RuleError::DuplicatePppoe);
                }
                pppoe += 1;
                fields.pppoe = Some(*info);
            }
            InterfaceKind::IpsecTunnel => {
                if ipsec != 0 {
                    return Err(RuleError::DuplicateIpsec);
                }
                ipsec += 1;
                fields.same_chip = true;
            }
            InterfaceKind::Lag { .. }
            | InterfaceKind::Sit
            | InterfaceKind::Tunipip6
            | InterfaceKind::Loopback
            | InterfaceKind::Unknown => {}
        }
    }

    Ok(fields)
}

/// Build the offload rule for one acceleration attempt.
///
/// The caller transitions the connection to the rule-failure state on
/// `Err`; classifier rule hooks are applied by the caller afterwards so
/// plugin contributions land on a validated rule.
pub fn build(
    inputs: &RuleInputs<'_>,
    verdict: &AggregateVerdict,
    settings: &RuleSettings,
) -> Result<OffloadRule, RuleError> {
    let from_inner = inputs
        .from_chain
        .inner()
        .ok_or(RuleError::EmptyChain("from"))?;
    let to_inner = inputs.to_chain.inner().ok_or(RuleError::EmptyChain("to"))?;

    // Both innermost devices must be visible to the accelerator; their
    // ids seed the flow/return interface numbers.
    let mut flow_interface = from_inner
        .accel_id
        .ok_or(RuleError::UnknownAccelInterface(from_inner.device))?;
    let mut return_interface = to_inner
        .accel_id
        .ok_or(RuleError::UnknownAccelInterface(to_inner.device))?;

    let from = collect_side(inputs.from_chain, "from")?;
    let to = collect_side(inputs.to_chain, "to")?;

    if from.same_chip {
        flow_interface = settings.same_chip_interface;
    }
    if to.same_chip {
        return_interface = settings.same_chip_interface;
    }

    // The from side fills ingress tag slots, the to side egress slots.
    let vlan_primary = VlanPair {
        ingress: from.vlan_primary.unwrap_or(VLAN_TAG_NOT_CONFIGURED),
        egress: to.vlan_primary.unwrap_or(VLAN_TAG_NOT_CONFIGURED),
    };
    let vlan_secondary = VlanPair {
        ingress: from.vlan_secondary.unwrap_or(VLAN_TAG_NOT_CONFIGURED),
        egress: to.vlan_secondary.unwrap_or(VLAN_TAG_NOT_CONFIGURED),
    };

    let (tcp, no_seq_check) = match (inputs.tuple.proto_class(), inputs.tcp) {
        (ProtoClass::Tcp, Some(state)) => {
            let liberal =
                settings.tcp_liberal || state.seen[0].liberal || state.seen[1].liberal;
            (Some(TcpWindowSnapshot::from_state(state)), liberal)
        }
        // No tracked state: sequence checking cannot be meaningful.
        (ProtoClass::Tcp, None) => (None, true),
        _ => (None, false),
    };

    Ok(OffloadRule {
        tuple: inputs.tuple,
        flow_interface,
        return_interface,
        flow_mac: inputs.from_node_mac,
        return_mac: inputs.to_node_mac,
        flow_iface_mac: from.mac,
        return_iface_mac: to.mac,
        flow_mtu: inputs.from_chain.outer().map_or(0, |i| i.mtu),
        return_mtu: inputs.to_chain.outer().map_or(0, |i| i.mtu),
        routed: inputs.routed,
        vlan_primary,
        vlan_secondary,
        flow_pppoe: from.pppoe,
        return_pppoe: to.pppoe,
        qos: verdict.qos,
        dscp: verdict.dscp,
        tcp,
        no_seq_check,
    })
}
