//! Bridge-hook frame discrimination over a simulated switch.

use std::sync::Arc;

use adapters::netsim::SimNetwork;
use application::bridge_hook::{BridgeFrame, BridgeVerdict, ETHERTYPE_IPV6, classify_bridge_frame};
use domain::common::entity::MacAddr;
use domain::iface::entity::DeviceId;
use ports::secondary::device_port::{DeviceDescriptor, LinkKind};

const BRIDGE: DeviceId = DeviceId(10);
const PORT_A: DeviceId = DeviceId(1);
const PORT_B: DeviceId = DeviceId(2);

const BRIDGE_MAC: MacAddr = MacAddr([2, 0, 0, 0, 0, 10]);
const STATION_A: MacAddr = MacAddr([2, 0, 0, 0, 1, 1]);
const STATION_B: MacAddr = MacAddr([2, 0, 0, 0, 1, 2]);

fn switch() -> Arc<SimNetwork> {
    let net = Arc::new(SimNetwork::new());
    net.add_device(DeviceDescriptor {
        id: BRIDGE,
        name: "br0".into(),
        mtu: 1500,
        accel_id: Some(BRIDGE.0),
        link: LinkKind::Bridge { mac: BRIDGE_MAC },
    });
    net.add_bridge_station(BRIDGE, STATION_A, PORT_A);
    net.add_bridge_station(BRIDGE, STATION_B, PORT_B);
    net
}

fn frame() -> BridgeFrame {
    BridgeFrame {
        out_port: PORT_B,
        in_device: Some(PORT_A),
        eth_src: STATION_A,
        eth_dst: STATION_B,
        ethertype: ETHERTYPE_IPV6,
    }
}

#[test]
fn bridged_frame_is_processed_with_source_port() {
    let net = switch();
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &frame()),
        BridgeVerdict::Process { in_port: PORT_A }
    );
}

#[test]
fn non_ipv6_is_ignored() {
    let net = switch();
    let f = BridgeFrame {
        ethertype: 0x0800,
        ..frame()
    };
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &f),
        BridgeVerdict::Ignore("not ipv6")
    );
}

#[test]
fn local_source_is_ignored() {
    let net = switch();
    let f = BridgeFrame {
        in_device: None,
        ..frame()
    };
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &f),
        BridgeVerdict::Ignore("local source")
    );
}

#[test]
fn port_bounce_is_ignored() {
    let net = switch();
    let f = BridgeFrame {
        out_port: PORT_A,
        ..frame()
    };
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &f),
        BridgeVerdict::Ignore("port bounce")
    );
}

#[test]
fn routed_over_bridge_is_ignored() {
    let net = switch();
    net.add_bridge_station(BRIDGE, BRIDGE_MAC, PORT_A);
    let f = BridgeFrame {
        eth_src: BRIDGE_MAC,
        ..frame()
    };
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &f),
        BridgeVerdict::Ignore("routed")
    );
}

#[test]
fn unknown_station_is_ignored() {
    let net = switch();
    let f = BridgeFrame {
        eth_src: MacAddr([2, 0, 0, 0, 9, 9]),
        ..frame()
    };
    assert_eq!(
        classify_bridge_frame(net.as_ref(), &f),
        BridgeVerdict::Ignore("unknown source station")
    );
}
