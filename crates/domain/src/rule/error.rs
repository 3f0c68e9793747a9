use thiserror::Error;

use crate::iface::entity::DeviceId;

/// Rule-construction failures. All of these are terminal for the
/// acceleration attempt: the connection moves to the rule-failure
/// state and is never retried without being recreated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("no interfaces in the {0} hierarchy")]
    EmptyChain(&'static str),

    #[error("interface {0} is not known to the fast path")]
    UnknownAccelInterface(DeviceId),

    #[error("cascaded bridges cannot be described")]
    CascadedBridge,

    #[error("more than two stacked VLANs cannot be described")]
    VlanDepth,

    #[error("more than one PPPoE session cannot be described")]
    DuplicatePppoe,

    #[error("more than one IPsec boundary cannot be described")]
    DuplicateIpsec,
}
