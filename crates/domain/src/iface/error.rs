use std::net::Ipv6Addr;

use thiserror::Error;

use crate::common::entity::MacAddr;

use super::entity::DeviceId;

/// Reasons a hierarchy cannot be constructed right now.
///
/// All of these are recoverable: the packet is passed through
/// unaccelerated and the next packet for the flow retries from scratch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no egress device for {0}")]
    NoRoute(Ipv6Addr),

    #[error("neighbor unresolved for {0}")]
    NeighborUnresolved(Ipv6Addr),

    #[error("no bridge port holds {0}")]
    BridgePortUnknown(MacAddr),

    #[error("aggregation slave unavailable on {0}")]
    LinkDown(DeviceId),

    #[error("local tunnel endpoint, no forwarding hierarchy")]
    TunnelEndpoint,

    #[error("hierarchy deeper than supported")]
    DepthExceeded,

    #[error("device {0} not describable")]
    UnknownDevice(DeviceId),
}
