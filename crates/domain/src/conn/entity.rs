use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};

use crate::accel::entity::{AccelContext, AccelLimits};
use crate::classifier::entity::ClassifierKind;
use crate::classifier::plugin::Classifier;
use crate::common::entity::{Direction, FlowTuple, MacAddr, ProtoClass, Sender, TimerGroup};
use crate::iface::entity::InterfaceChain;

/// Link-layer identity, deduplicated in the shared identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub mac: MacAddr,
}

/// Network-layer identity; keeps its node alive.
#[derive(Debug, Clone)]
pub struct Host {
    pub addr: Ipv6Addr,
    pub node: Arc<Node>,
}

/// Network + transport identity; keeps its host alive.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub addr: Ipv6Addr,
    pub port: i32,
    pub host: Arc<Host>,
}

impl Mapping {
    pub fn node_mac(&self) -> MacAddr {
        self.host.node.mac
    }
}

/// One direction of tracked TCP window state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpDirState {
    pub window_scale: u8,
    pub max_window: u32,
    pub end: u32,
    pub max_end: u32,
    pub liberal: bool,
}

/// Conntrack's view of a TCP connection. `seen[0]` is the original
/// direction, `seen[1]` the reply direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpState {
    pub seen: [TcpDirState; 2],
    pub terminating: bool,
}

/// TCP window fields carried in an offload rule and echoed back in
/// stats-sync messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpWindowSnapshot {
    pub flow_window_scale: u8,
    pub flow_max_window: u32,
    pub flow_end: u32,
    pub flow_max_end: u32,
    pub return_window_scale: u8,
    pub return_max_window: u32,
    pub return_end: u32,
    pub return_max_end: u32,
}

impl TcpWindowSnapshot {
    pub fn from_state(state: &TcpState) -> Self {
        Self {
            flow_window_scale: state.seen[0].window_scale,
            flow_max_window: state.seen[0].max_window,
            flow_end: state.seen[0].end,
            flow_max_end: state.seen[0].max_end,
            return_window_scale: state.seen[1].window_scale,
            return_max_window: state.seen[1].max_window,
            return_end: state.seen[1].end,
            return_max_end: state.seen[1].max_end,
        }
    }
}

/// Why the fast path sent a per-connection sync message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// Periodic statistics push.
    Stats,
    /// Final sync for a manager-initiated destroy; the destroy
    /// acknowledgement carries the state change, not this.
    Destroy,
    /// Fast path flushed the rule on its own.
    Flush,
    /// Fast path evicted the rule on its own.
    Evict,
}

/// Periodic per-connection statistics from the fast path.
#[derive(Debug, Clone, Copy)]
pub struct ConnSync {
    pub tuple: FlowTuple,
    pub reason: SyncReason,
    pub flow_tx_packets: u64,
    pub flow_tx_bytes: u64,
    pub flow_rx_packets: u64,
    pub flow_rx_bytes: u64,
    pub return_tx_packets: u64,
    pub return_tx_bytes: u64,
    pub return_rx_packets: u64,
    pub return_rx_bytes: u64,
    /// Milliseconds of idle-timeout credit accumulated while packets
    /// bypassed the slow path.
    pub inc_ticks_ms: u64,
    pub tcp: Option<TcpWindowSnapshot>,
}

/// Per-side byte/packet totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataTotals {
    pub bytes: u64,
    pub packets: u64,
    pub dropped_bytes: u64,
    pub dropped_packets: u64,
}

#[derive(Debug, Default)]
struct ConnectionInner {
    from_chain: InterfaceChain,
    to_chain: InterfaceChain,
    timer_group: Option<TimerGroup>,
    generation: u32,
    defunct: bool,
    from_data: DataTotals,
    to_data: DataTotals,
}

/// A tracked flow and everything needed to offload it.
///
/// Shared via `Arc`: the store holds the creator's reference and every
/// packet-path or callback access clones the handle for its own scope.
/// Mutable state sits behind one short-held lock; the acceleration
/// state machine carries its own lock so transitions never contend
/// with data-plane counter updates.
pub struct Connection {
    serial: u32,
    tuple: FlowTuple,
    direction: Direction,
    proto_class: ProtoClass,
    from_mapping: Arc<Mapping>,
    to_mapping: Arc<Mapping>,
    accel: AccelContext,
    inner: Mutex<ConnectionInner>,
    // Assignments get their own lock: classifier callbacks run with no
    // connection lock held.
    assignments: Mutex<Vec<Arc<dyn Classifier>>>,
}

impl Connection {
    pub fn new(
        serial: u32,
        tuple: FlowTuple,
        direction: Direction,
        from_mapping: Arc<Mapping>,
        to_mapping: Arc<Mapping>,
        can_accel: bool,
        limits: AccelLimits,
        generation: u32,
    ) -> Self {
        Self {
            serial,
            tuple,
            direction,
            proto_class: tuple.proto_class(),
            from_mapping,
            to_mapping,
            accel: AccelContext::new(can_accel, limits),
            inner: Mutex::new(ConnectionInner {
                generation,
                ..ConnectionInner::default()
            }),
            assignments: Mutex::new(Vec::new()),
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn tuple(&self) -> FlowTuple {
        self.tuple
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn proto_class(&self) -> ProtoClass {
        self.proto_class
    }

    pub fn accel(&self) -> &AccelContext {
        &self.accel
    }

    pub fn from_mapping(&self) -> &Arc<Mapping> {
        &self.from_mapping
    }

    pub fn to_mapping(&self) -> &Arc<Mapping> {
        &self.to_mapping
    }

    pub fn from_node_mac(&self) -> MacAddr {
        self.from_mapping.node_mac()
    }

    pub fn to_node_mac(&self) -> MacAddr {
        self.to_mapping.node_mac()
    }

    /// Which side of the connection a packet with this source belongs to.
    pub fn sender_of(&self, src_addr: &Ipv6Addr) -> Sender {
        if *src_addr == self.tuple.src_addr {
            Sender::Src
        } else {
            Sender::Dest
        }
    }

    // ── Interface hierarchies ─────────────────────────────────────

    pub fn set_from_chain(&self, chain: InterfaceChain) {
        self.inner.lock().expect("conn lock poisoned").from_chain = chain;
    }

    pub fn set_to_chain(&self, chain: InterfaceChain) {
        self.inner.lock().expect("conn lock poisoned").to_chain = chain;
    }

    pub fn from_chain(&self) -> InterfaceChain {
        self.inner.lock().expect("conn lock poisoned").from_chain.clone()
    }

    pub fn to_chain(&self) -> InterfaceChain {
        self.inner.lock().expect("conn lock poisoned").to_chain.clone()
    }

    // ── Lifetime ──────────────────────────────────────────────────

    /// Keep the connection alive after seeing activity. Returns false
    /// when the connection is already defunct and the packet must not
    /// be attributed to it.
    pub fn touch(&self) -> bool {
        !self.inner.lock().expect("conn lock poisoned").defunct
    }

    pub fn make_defunct(&self) {
        self.inner.lock().expect("conn lock poisoned").defunct = true;
    }

    pub fn is_defunct(&self) -> bool {
        self.inner.lock().expect("conn lock poisoned").defunct
    }

    // ── Classifier generation ─────────────────────────────────────

    pub fn generation(&self) -> u32 {
        self.inner.lock().expect("conn lock poisoned").generation
    }

    pub fn set_generation(&self, generation: u32) {
        self.inner.lock().expect("conn lock poisoned").generation = generation;
    }

    // ── Timer group ───────────────────────────────────────────────

    pub fn timer_group(&self) -> Option<TimerGroup> {
        self.inner.lock().expect("conn lock poisoned").timer_group
    }

    pub fn set_timer_group(&self, group: TimerGroup) {
        self.inner.lock().expect("conn lock poisoned").timer_group = Some(group);
    }

    // ── Data totals ───────────────────────────────────────────────

    pub fn credit_data(&self, sender: Sender, bytes: u64, packets: u64) {
        let mut inner = self.inner.lock().expect("conn lock poisoned");
        let side = match sender {
            Sender::Src => &mut inner.from_data,
            Sender::Dest => &mut inner.to_data,
        };
        side.bytes += bytes;
        side.packets += packets;
    }

    pub fn credit_dropped(&self, sender: Sender, bytes: u64, packets: u64) {
        let mut inner = self.inner.lock().expect("conn lock poisoned");
        let side = match sender {
            Sender::Src => &mut inner.from_data,
            Sender::Dest => &mut inner.to_data,
        };
        side.dropped_bytes += bytes;
        side.dropped_packets += packets;
    }

    pub fn totals(&self, sender: Sender) -> DataTotals {
        let inner = self.inner.lock().expect("conn lock poisoned");
        match sender {
            Sender::Src => inner.from_data,
            Sender::Dest => inner.to_data,
        }
    }

    // ── Classifier assignments ────────────────────────────────────

    /// Current assignments in ascending priority (kind ordinal) order.
    pub fn assignments(&self) -> Vec<Arc<dyn Classifier>> {
        self.assignments
            .lock()
            .expect("assignments lock poisoned")
            .clone()
    }

    /// Insert keeping ascending kind order; a same-kind assignment is
    /// replaced.
    pub fn assign(&self, classifier: Arc<dyn Classifier>) {
        let mut list = self.assignments.lock().expect("assignments lock poisoned");
        let kind = classifier.kind();
        if let Some(slot) = list.iter_mut().find(|c| c.kind() == kind) {
            *slot = classifier;
            return;
        }
        let at = list
            .iter()
            .position(|c| c.kind().ordinal() > kind.ordinal())
            .unwrap_or(list.len());
        list.insert(at, classifier);
    }

    /// Remove an assignment. The default classifier is permanent and
    /// unassign requests for it are ignored.
    pub fn unassign(&self, kind: ClassifierKind) {
        if kind == ClassifierKind::Default {
            return;
        }
        self.assignments
            .lock()
            .expect("assignments lock poisoned")
            .retain(|c| c.kind() != kind);
    }

    pub fn find_assigned(&self, kind: ClassifierKind) -> Option<Arc<dyn Classifier>> {
        self.assignments
            .lock()
            .expect("assignments lock poisoned")
            .iter()
            .find(|c| c.kind() == kind)
            .cloned()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("serial", &self.serial)
            .field("tuple", &self.tuple)
            .field("direction", &self.direction)
            .field("accel_mode", &self.accel.mode())
            .finish_non_exhaustive()
    }
}
