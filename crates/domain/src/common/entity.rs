use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

/// IP protocol numbers the dispatcher cares about.
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_IPIP: u8 = 4;
pub const PROTO_ESP: u8 = 50;

/// 48-bit link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: Self = Self([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Group bit of the first octet.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Placeholder node address derived from the first bytes of an IP
    /// address. Used when no interface type on the path can supply a
    /// real link-layer address.
    pub fn from_addr_bytes(addr: &Ipv6Addr) -> Self {
        let octets = addr.octets();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&octets[..6]);
        Self(mac)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Transport class a connection belongs to. Chosen once at creation
/// from the IP protocol and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtoClass {
    Tcp,
    Udp,
    NonPorted,
}

impl ProtoClass {
    pub fn of(protocol: u8) -> Self {
        match protocol {
            PROTO_TCP => Self::Tcp,
            PROTO_UDP => Self::Udp,
            _ => Self::NonPorted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::NonPorted => "non_ported",
        }
    }
}

impl std::fmt::Display for ProtoClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection identity. Ports are signed: non-ported protocols carry
/// the negative protocol number as a pseudo-port (IP-in-IP uses 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub protocol: u8,
    pub src_port: i32,
    pub dst_port: i32,
}

impl FlowTuple {
    pub fn new(
        src_addr: Ipv6Addr,
        dst_addr: Ipv6Addr,
        protocol: u8,
        src_port: i32,
        dst_port: i32,
    ) -> Self {
        Self {
            src_addr,
            dst_addr,
            protocol,
            src_port,
            dst_port,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            src_addr: self.dst_addr,
            dst_addr: self.src_addr,
            protocol: self.protocol,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }

    pub fn proto_class(&self) -> ProtoClass {
        ProtoClass::of(self.protocol)
    }
}

impl std::fmt::Display for FlowTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]:{} -> [{}]:{} proto {}",
            self.src_addr, self.src_port, self.dst_addr, self.dst_port, self.protocol
        )
    }
}

/// How the packet reached the egress device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Routed,
    Bridged,
}

impl Direction {
    pub fn is_routed(self) -> bool {
        self == Self::Routed
    }
}

/// Which side of the connection emitted the packet at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Src,
    Dest,
}

/// Idle-timeout policy classes a connection can be assigned to.
/// Classifiers may move a connection between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerGroup {
    Initial,
    Generic,
    Udp,
    TcpTransient,
    TcpEstablished,
}

impl TimerGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Generic => "generic",
            Self::Udp => "udp",
            Self::TcpTransient => "tcp_transient",
            Self::TcpEstablished => "tcp_established",
        }
    }
}

/// Per-packet metadata the classifiers see. The payload itself never
/// reaches this layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketView {
    pub len: u32,
    /// QoS priority the packet arrived with; seeds the aggregate
    /// verdict and may be rewritten by a classifier.
    pub priority: u32,
}

/// Flow/return QoS tags carried into the offload rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosTags {
    pub flow_tag: u32,
    pub return_tag: u32,
}

/// Flow/return DSCP remark values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DscpMarking {
    pub flow_dscp: u8,
    pub return_dscp: u8,
}
