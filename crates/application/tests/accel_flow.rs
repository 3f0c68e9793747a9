//! End-to-end acceleration lifecycle: packet in, connection created,
//! rule submitted, acknowledgements settled, counters balanced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use adapters::classifier::StandardClassifierFactory;
use adapters::netsim::{SimConntrack, SimNetwork};
use adapters::offload::{ChannelOffloadTransport, TransportBehavior};
use adapters::storage::{
    InMemoryConnectionStore, InMemoryIdentityStore, InMemoryInterfaceStore,
};
use application::accel_engine::AccelEngine;
use application::classify::ClassifierRuntime;
use application::control_service_impl::ControlState;
use application::dispatch::PacketDispatcher;
use application::establish::IdentityEstablisher;
use application::hierarchy::HierarchyResolver;
use application::sync_pipeline::OffloadEventDispatcher;
use domain::accel::counters::AcceleratedCounts;
use domain::accel::entity::{AccelLimits, AccelMode};
use domain::classifier::entity::{
    AccelPermit, ClassifierKind, ClassifierResponse, Relevance,
};
use domain::classifier::plugin::{Classifier, ClassifierFactory};
use domain::common::entity::{
    FlowTuple, MacAddr, PROTO_TCP, PacketView, ProtoClass, Sender,
};
use domain::conn::entity::{ConnSync, Connection, SyncReason, TcpState};
use domain::iface::entity::DeviceId;
use domain::rule::builder::RuleSettings;
use ports::primary::control::ControlPort;
use ports::primary::packet_hook::{Ipv6Header, PacketHookPort, PacketMeta};
use ports::secondary::connection_store::ConnectionStorePort;
use ports::secondary::device_port::{DeviceDescriptor, LinkKind};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::offload_port::OffloadEvent;
use ports::test_utils::NoopMetrics;

/// Test-only policy classifier in the steering slot: denies
/// acceleration until the gate opens, so tests can observe the
/// post-creation state before any offload attempt.
struct GateClassifier {
    allow: Arc<AtomicBool>,
}

impl Classifier for GateClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Steer
    }

    fn process(&self, _sender: Sender, _packet: &PacketView) -> ClassifierResponse {
        let accel = if self.allow.load(Ordering::Relaxed) {
            None
        } else {
            Some(AccelPermit::Deny)
        };
        ClassifierResponse {
            accel,
            ..ClassifierResponse::relevant(Relevance::Yes)
        }
    }
}

struct GatedFactory {
    inner: StandardClassifierFactory,
    allow: Arc<AtomicBool>,
}

impl ClassifierFactory for GatedFactory {
    fn create(
        &self,
        kind: ClassifierKind,
        conn: &Arc<Connection>,
    ) -> Option<Arc<dyn Classifier>> {
        if kind == ClassifierKind::Steer {
            return Some(Arc::new(GateClassifier {
                allow: Arc::clone(&self.allow),
            }));
        }
        self.inner.create(kind, conn)
    }
}

struct Harness {
    conntrack: Arc<SimConntrack>,
    store: Arc<InMemoryConnectionStore>,
    transport: Arc<ChannelOffloadTransport>,
    engine: Arc<AccelEngine>,
    dispatcher: Arc<PacketDispatcher>,
    events: OffloadEventDispatcher,
    rx: mpsc::Receiver<OffloadEvent>,
    control: Arc<ControlState>,
    counters: Arc<AcceleratedCounts>,
    gate: Arc<AtomicBool>,
}

const LAN_DEV: DeviceId = DeviceId(1);
const WAN_DEV: DeviceId = DeviceId(2);

fn eth(id: DeviceId, name: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id,
        name: name.to_string(),
        mtu: 1500,
        accel_id: Some(id.0),
        link: LinkKind::Ethernet {
            mac: MacAddr([2, 0, 0, 0, 0, id.0 as u8]),
        },
    }
}

fn tcp_tuple() -> FlowTuple {
    FlowTuple::new(
        "2001:db8::1".parse().unwrap(),
        "2001:db8::2".parse().unwrap(),
        PROTO_TCP,
        5000,
        80,
    )
}

fn tcp_tuple_with_port(src_port: i32) -> FlowTuple {
    FlowTuple {
        src_port,
        ..tcp_tuple()
    }
}

fn meta_for(tuple: &FlowTuple) -> PacketMeta {
    PacketMeta {
        in_device: LAN_DEV,
        out_device: WAN_DEV,
        src_link_addr: None,
        dst_link_addr: None,
        can_accel: true,
        is_routed: true,
        header: Ipv6Header {
            src_addr: tuple.src_addr,
            dst_addr: tuple.dst_addr,
            protocol: tuple.protocol,
            src_port: tuple.src_port as u16,
            dst_port: tuple.dst_port as u16,
            fragmented: false,
        },
        view: PacketView {
            len: 100,
            priority: 0,
        },
    }
}

impl Harness {
    fn new() -> Self {
        Self::with_limits(AccelLimits::default())
    }

    fn with_limits(limits: AccelLimits) -> Self {
        let net = Arc::new(SimNetwork::new());
        net.add_device(eth(LAN_DEV, "eth0"));
        net.add_device(eth(WAN_DEV, "eth1"));
        net.add_route("2001:db8::1".parse().unwrap(), LAN_DEV, false);
        net.add_route("2001:db8::2".parse().unwrap(), WAN_DEV, false);
        net.add_neighbor(
            "2001:db8::1".parse().unwrap(),
            MacAddr([2, 0, 0, 0, 9, 1]),
        );
        net.add_neighbor(
            "2001:db8::2".parse().unwrap(),
            MacAddr([2, 0, 0, 0, 9, 2]),
        );

        let conntrack = Arc::new(SimConntrack::new());
        let store = Arc::new(InMemoryConnectionStore::new());
        let interfaces = Arc::new(InMemoryInterfaceStore::new());
        let identities = Arc::new(InMemoryIdentityStore::new());
        let metrics: Arc<dyn MetricsPort> = Arc::new(NoopMetrics);

        let (tx, rx) = mpsc::channel(64);
        let transport = Arc::new(ChannelOffloadTransport::new(tx));

        let counters = Arc::new(AcceleratedCounts::new());
        let control = Arc::new(ControlState::new(limits, Arc::clone(&counters)));

        let engine = Arc::new(AccelEngine::new(
            transport.clone(),
            conntrack.clone(),
            counters.clone(),
            metrics.clone(),
            RuleSettings::default(),
        ));

        let resolver = Arc::new(HierarchyResolver::new(
            net.clone(),
            net.clone(),
            net.clone(),
            interfaces,
        ));
        let establisher = Arc::new(IdentityEstablisher::new(
            identities,
            net.clone(),
            net.clone(),
        ));

        let gate = Arc::new(AtomicBool::new(false));
        let classifiers = Arc::new(ClassifierRuntime::new(
            Arc::new(GatedFactory {
                inner: StandardClassifierFactory::new(None),
                allow: Arc::clone(&gate),
            }),
            metrics.clone(),
        ));

        let dispatcher = Arc::new(PacketDispatcher::new(
            store.clone(),
            resolver,
            establisher,
            classifiers,
            engine.clone(),
            conntrack.clone(),
            control.clone(),
            metrics.clone(),
        ));

        let events = OffloadEventDispatcher::new(
            store.clone(),
            engine.clone(),
            conntrack.clone(),
            net,
            metrics,
        );

        Self {
            conntrack,
            store,
            transport,
            engine,
            dispatcher,
            events,
            rx,
            control,
            counters,
            gate,
        }
    }

    /// Deliver every queued offload event, as the event loop would.
    fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.events.dispatch(event);
        }
    }

    /// Deliver exactly one queued event.
    fn pump_one(&mut self) {
        let event = self.rx.try_recv().expect("an event should be queued");
        self.events.dispatch(event);
    }

    fn connection(&self, tuple: &FlowTuple) -> Arc<Connection> {
        self.store.find(tuple).expect("connection should exist")
    }
}

#[test]
fn new_tcp_syn_creates_connection_in_decel() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.conntrack.set_tcp_state(tuple, TcpState::default());

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();

    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert_eq!(conn.proto_class(), ProtoClass::Tcp);

    // Full classifier coverage, default first.
    let kinds: Vec<_> = conn.assignments().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ClassifierKind::Default,
            ClassifierKind::Mark,
            ClassifierKind::Dscp,
            ClassifierKind::Steer,
        ]
    );
    assert!(h.transport.submitted_creates().is_empty());
}

#[test]
fn accelerate_verdict_submits_and_ack_lands_in_accel() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.conntrack.set_tcp_state(tuple, TcpState::default());
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::AccelPending);

    // The submitted rule describes the whole forwarding context.
    let rules = h.transport.submitted_creates();
    assert_eq!(rules.len(), 1);
    let rule = &rules[0];
    assert_eq!(rule.tuple, tuple);
    assert_eq!(rule.flow_interface, LAN_DEV.0);
    assert_eq!(rule.return_interface, WAN_DEV.0);
    assert_eq!(rule.flow_mac, MacAddr([2, 0, 0, 0, 9, 1]));
    assert_eq!(rule.return_mac, MacAddr([2, 0, 0, 0, 9, 2]));
    assert!(rule.routed);
    assert!(rule.tcp.is_some());

    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::Accel);
    assert_eq!(h.counters.get(ProtoClass::Tcp), 1);
    assert_eq!(h.counters.total(), 1);
    assert_eq!(h.control.accelerated(ProtoClass::Tcp), 1);
}

#[test]
fn decelerate_while_pending_is_deferred_then_applied() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::AccelPending);

    // Decelerate races the in-flight create: deferred, not lost.
    h.engine.decelerate(&conn);
    assert_eq!(conn.accel().mode(), AccelMode::AccelPending);
    assert!(h.transport.submitted_destroys().is_empty());

    // Create ack arrives: acceleration completes, then the deferred
    // decelerate immediately begins.
    h.pump_one();
    assert_eq!(conn.accel().mode(), AccelMode::DecelPending);
    assert_eq!(h.transport.submitted_destroys(), vec![tuple]);

    // Destroy ack settles it; counters return to zero.
    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert_eq!(h.counters.total(), 0);
}

#[test]
fn nack_reverts_to_decel_and_allows_retry() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);
    h.transport.set_behavior(TransportBehavior {
        nack_create: true,
        ..TransportBehavior::default()
    });

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();

    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert_eq!(conn.accel().snapshot().stats.nack, 1);
    assert_eq!(h.counters.total(), 0);

    // Engine recovered: the next packet retries and succeeds.
    h.transport.set_behavior(TransportBehavior::default());
    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::Accel);
}

#[test]
fn nack_limit_is_terminal() {
    let mut h = Harness::with_limits(AccelLimits {
        nack: 2,
        ..AccelLimits::default()
    });
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);
    h.transport.set_behavior(TransportBehavior {
        nack_create: true,
        ..TransportBehavior::default()
    });

    for _ in 0..2 {
        h.dispatcher.process(&meta_for(&tuple));
        h.pump();
    }
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::FailNack);

    // Terminal: further packets change nothing.
    h.transport.set_behavior(TransportBehavior::default());
    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::FailNack);
    assert_eq!(h.transport.submitted_creates().len(), 2);
}

#[test]
fn accelerate_n_then_decelerate_n_counters_end_at_zero() {
    let mut h = Harness::new();
    h.gate.store(true, Ordering::Relaxed);
    let n = 5;

    let tuples: Vec<FlowTuple> = (0..n).map(|i| tcp_tuple_with_port(6000 + i)).collect();
    for tuple in &tuples {
        h.conntrack.track(*tuple);
        h.dispatcher.process(&meta_for(tuple));
    }
    h.pump();
    assert_eq!(h.counters.get(ProtoClass::Tcp), n as u64);
    assert_eq!(h.counters.total(), n as u64);

    for tuple in &tuples {
        let conn = h.connection(tuple);
        h.engine.decelerate(&conn);
    }
    h.pump();
    assert_eq!(h.counters.get(ProtoClass::Tcp), 0);
    assert_eq!(h.counters.total(), 0);
    for tuple in &tuples {
        assert_eq!(h.connection(tuple).accel().mode(), AccelMode::Decel);
    }
}

#[test]
fn eviction_sync_returns_connection_to_decel() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::Accel);

    h.transport.emit_sync(ConnSync {
        tuple,
        reason: SyncReason::Evict,
        flow_tx_packets: 0,
        flow_tx_bytes: 0,
        flow_rx_packets: 0,
        flow_rx_bytes: 0,
        return_tx_packets: 0,
        return_tx_bytes: 0,
        return_rx_packets: 0,
        return_rx_bytes: 0,
        inc_ticks_ms: 0,
        tcp: None,
    });
    h.pump();

    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert_eq!(h.counters.total(), 0);
    // The eviction carried no traffic, so the no-action evidence stands.
    assert_eq!(conn.accel().snapshot().stats.no_action_seen_total, 1);
}

#[test]
fn stats_sync_credits_totals_and_clears_no_action() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().snapshot().stats.no_action_seen, 1);

    h.transport.emit_sync(ConnSync {
        tuple,
        reason: SyncReason::Stats,
        flow_tx_packets: 10,
        flow_tx_bytes: 4000,
        flow_rx_packets: 10,
        flow_rx_bytes: 4000,
        return_tx_packets: 8,
        return_tx_bytes: 3000,
        return_rx_packets: 8,
        return_rx_bytes: 3000,
        inc_ticks_ms: 5000,
        tcp: None,
    });
    h.pump();

    assert_eq!(conn.accel().snapshot().stats.no_action_seen, 0);
    // One slow-path packet plus the fast-path credit.
    assert_eq!(conn.totals(Sender::Src).packets, 11);
    assert_eq!(conn.totals(Sender::Dest).packets, 8);
    assert_eq!(h.conntrack.timeout_credit_ms(&tuple), 5000);
}

#[test]
fn generation_change_on_sync_forces_deceleration() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::Accel);

    h.store.bump_generation();
    h.transport.emit_sync(ConnSync {
        tuple,
        reason: SyncReason::Stats,
        flow_tx_packets: 0,
        flow_tx_bytes: 0,
        flow_rx_packets: 0,
        flow_rx_bytes: 0,
        return_tx_packets: 0,
        return_tx_bytes: 0,
        return_rx_packets: 0,
        return_rx_bytes: 0,
        inc_ticks_ms: 0,
        tcp: None,
    });
    // The sync handler requests deceleration; its destroy response
    // lands behind it in the same drain.
    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert_eq!(h.counters.total(), 0);
}

#[test]
fn conntrack_destroy_decelerates_and_removes() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    let conn = h.connection(&tuple);

    h.dispatcher.conntrack_destroy_event(&tuple);
    assert!(conn.is_defunct());
    assert_eq!(conn.accel().mode(), AccelMode::DecelPending);
    // Still findable until the destroy acknowledgement settles the
    // accelerated counters.
    assert!(h.store.find(&tuple).is_some());

    h.pump();
    assert_eq!(conn.accel().mode(), AccelMode::Decel);
    assert!(h.store.find(&tuple).is_none());
    assert_eq!(h.counters.total(), 0);
}

#[test]
fn stopped_dispatcher_ignores_packets() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.control.stop();

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    assert!(h.store.find(&tuple).is_none());

    h.control.resume();
    h.dispatcher.process(&meta_for(&tuple));
    assert!(h.store.find(&tuple).is_some());
}

#[test]
fn terminate_pending_fails_creation_open() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.control.begin_terminate();

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();
    assert!(h.store.find(&tuple).is_none());
}

#[test]
fn terminating_tcp_flow_is_not_tracked() {
    let h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.conntrack.set_terminating(tuple);

    h.dispatcher.process(&meta_for(&tuple));
    assert!(h.store.find(&tuple).is_none());
}

#[test]
fn l2tp_encapsulated_udp_is_skipped() {
    let h = Harness::new();
    let tuple = FlowTuple {
        protocol: domain::common::entity::PROTO_UDP,
        ..tcp_tuple()
    };
    h.conntrack.track(tuple);
    h.conntrack.set_l2tp_encap(tuple);

    h.dispatcher.process(&meta_for(&tuple));
    assert!(h.store.find(&tuple).is_none());
}

#[test]
fn helper_flow_is_created_but_never_eligible() {
    let mut h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);
    h.conntrack.set_helper(tuple);
    h.gate.store(true, Ordering::Relaxed);

    h.dispatcher.process(&meta_for(&tuple));
    h.pump();

    let conn = h.connection(&tuple);
    assert_eq!(conn.accel().mode(), AccelMode::Denied);
    assert!(h.transport.submitted_creates().is_empty());
}

#[test]
fn reply_direction_packet_reuses_the_connection() {
    let h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);

    h.dispatcher.process(&meta_for(&tuple));
    assert_eq!(h.store.len(), 1);

    // The reply direction maps onto the same tracked tuple. The
    // return path resolves the reversed addressing.
    let reply = tuple.reversed();
    let mut meta = meta_for(&reply);
    meta.in_device = WAN_DEV;
    meta.out_device = LAN_DEV;
    h.dispatcher.process(&meta);
    assert_eq!(h.store.len(), 1);

    let conn = h.connection(&tuple);
    assert_eq!(conn.totals(Sender::Src).packets, 1);
    assert_eq!(conn.totals(Sender::Dest).packets, 1);
}

#[test]
fn concurrent_first_packets_create_one_connection() {
    use std::thread;

    let h = Harness::new();
    let tuple = tcp_tuple();
    h.conntrack.track(tuple);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = Arc::clone(&h.dispatcher);
        handles.push(thread::spawn(move || {
            dispatcher.process(&meta_for(&tuple));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(h.store.len(), 1);
}
