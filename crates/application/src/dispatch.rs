use std::net::Ipv6Addr;
use std::sync::Arc;

use domain::accel::entity::AccelMode;
use domain::classifier::entity::ClassifierKind;
use domain::common::entity::{Direction, FlowTuple, PROTO_IPIP, ProtoClass, TimerGroup};
use domain::conn::entity::Connection;
use ports::primary::control::ControlPort;
use ports::primary::packet_hook::{HookAction, PacketHookPort, PacketMeta};
use ports::secondary::connection_store::{CommitOutcome, ConnectionStorePort};
use ports::secondary::conntrack_port::ConntrackPort;
use ports::secondary::metrics_port::MetricsPort;

use crate::accel_engine::AccelEngine;
use crate::classify::ClassifierRuntime;
use crate::control_service_impl::ControlState;
use crate::establish::IdentityEstablisher;
use crate::hierarchy::{HierarchyRequest, HierarchyResolver};

/// Per-packet orchestration: connection lookup/creation, classifier
/// invocation, drop/accelerate decision and hand-off to the
/// acceleration engine.
///
/// Runs synchronously on the calling packet context; anything that
/// cannot complete immediately fails this packet's attempt and the
/// next packet retries from scratch.
pub struct PacketDispatcher {
    store: Arc<dyn ConnectionStorePort>,
    resolver: Arc<HierarchyResolver>,
    establisher: Arc<IdentityEstablisher>,
    classifiers: Arc<ClassifierRuntime>,
    engine: Arc<AccelEngine>,
    conntrack: Arc<dyn ConntrackPort>,
    control: Arc<ControlState>,
    metrics: Arc<dyn MetricsPort>,
}

fn non_unicast(addr: &Ipv6Addr) -> bool {
    addr.is_multicast() || addr.is_unspecified()
}

fn initial_timer_group(class: ProtoClass) -> TimerGroup {
    match class {
        ProtoClass::Tcp => TimerGroup::TcpTransient,
        ProtoClass::Udp => TimerGroup::Udp,
        ProtoClass::NonPorted => TimerGroup::Generic,
    }
}

impl PacketDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConnectionStorePort>,
        resolver: Arc<HierarchyResolver>,
        establisher: Arc<IdentityEstablisher>,
        classifiers: Arc<ClassifierRuntime>,
        engine: Arc<AccelEngine>,
        conntrack: Arc<dyn ConntrackPort>,
        control: Arc<ControlState>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            store,
            resolver,
            establisher,
            classifiers,
            engine,
            conntrack,
            control,
            metrics,
        }
    }

    fn process_inner(&self, meta: &PacketMeta) {
        if self.control.stopped() {
            return;
        }

        let hdr = &meta.header;
        if hdr.fragmented {
            return;
        }
        if non_unicast(&hdr.src_addr) || non_unicast(&hdr.dst_addr) {
            return;
        }

        let class = ProtoClass::of(hdr.protocol);
        let mut can_accel = meta.can_accel;

        let (src_port, dst_port) = match class {
            ProtoClass::Tcp | ProtoClass::Udp => {
                (i32::from(hdr.src_port), i32::from(hdr.dst_port))
            }
            ProtoClass::NonPorted => {
                if hdr.protocol == PROTO_IPIP {
                    (0, 0)
                } else {
                    // Pseudo-ports for protocols without transport
                    // identifiers; these flows are tracked but never
                    // offloaded.
                    can_accel = false;
                    let p = -i32::from(hdr.protocol);
                    (p, p)
                }
            }
        };

        let header_tuple = FlowTuple::new(
            hdr.src_addr,
            hdr.dst_addr,
            hdr.protocol,
            src_port,
            dst_port,
        );
        // Reply-direction packets must resolve to the tracked original
        // orientation so both directions share one connection.
        let tuple = self
            .conntrack
            .original_tuple(&header_tuple)
            .unwrap_or(header_tuple);

        if self.conntrack.has_helper(&tuple) {
            // The flow needs slow-path assistance to function.
            can_accel = false;
        }

        if class == ProtoClass::Udp && self.conntrack.is_l2tp_encap(&tuple) {
            tracing::trace!(%tuple, "skipping L2TP-encapsulated flow");
            return;
        }

        let conn = match self.store.find(&tuple) {
            Some(conn) => conn,
            None => match self.create_connection(meta, &tuple, can_accel, class) {
                Some(conn) => conn,
                None => return,
            },
        };

        // Activity keeps the connection alive; a defunct connection no
        // longer owns this packet.
        if !conn.touch() {
            return;
        }

        if conn.generation() != self.store.generation() && !self.regenerate(meta, &conn) {
            return;
        }

        let sender = conn.sender_of(&hdr.src_addr);
        let verdict = self.classifiers.process(&conn, sender, &meta.view);

        if let Some(group) = verdict.timer_group
            && conn.timer_group() != Some(group)
        {
            tracing::trace!(serial = conn.serial(), group = group.as_str(), "timer group change");
            conn.set_timer_group(group);
        }

        if verdict.drop {
            conn.credit_dropped(sender, u64::from(meta.view.len), 1);
            self.metrics.record_packet(class.as_str(), "drop");
            return;
        }
        conn.credit_data(sender, u64::from(meta.view.len), 1);
        self.metrics.record_packet(class.as_str(), "accept");

        if verdict.accel {
            self.engine.accelerate(&conn, &verdict);
        }
    }

    /// Full connection-creation path. `None` means the packet passes
    /// through unmanaged and a later packet retries.
    fn create_connection(
        &self,
        meta: &PacketMeta,
        tuple: &FlowTuple,
        can_accel: bool,
        class: ProtoClass,
    ) -> Option<Arc<Connection>> {
        // Never track a TCP flow that is already winding down.
        if class == ProtoClass::Tcp && self.conntrack.is_terminating(tuple) {
            tracing::trace!(%tuple, "connection terminating, not tracking");
            return None;
        }

        if self.control.terminate_pending() {
            tracing::warn!("terminating, packet passed through unmanaged");
            return None;
        }

        // The 'from' hierarchy walks back towards the sender.
        let from_chain = match self.resolver.construct(&HierarchyRequest {
            src_addr: tuple.dst_addr,
            dst_addr: tuple.src_addr,
            protocol: tuple.protocol,
            given_dest: Some(meta.in_device),
            given_src: Some(meta.in_device),
            is_routed: meta.is_routed,
            dst_node_mac: meta.src_link_addr,
            src_node_mac: meta.dst_link_addr,
        }) {
            Ok(chain) => chain,
            Err(err) => {
                tracing::debug!(%tuple, %err, "no 'from' hierarchy");
                return None;
            }
        };

        let src_mapping = self.establisher.establish_mapping(
            meta.in_device,
            &tuple.src_addr,
            tuple.src_port,
            &from_chain,
            meta.src_link_addr,
        )?;

        let to_chain = match self.resolver.construct(&HierarchyRequest {
            src_addr: tuple.src_addr,
            dst_addr: tuple.dst_addr,
            protocol: tuple.protocol,
            given_dest: Some(meta.out_device),
            given_src: Some(meta.in_device),
            is_routed: meta.is_routed,
            dst_node_mac: meta.dst_link_addr,
            src_node_mac: meta.src_link_addr,
        }) {
            Ok(chain) => chain,
            Err(err) => {
                tracing::debug!(%tuple, %err, "no 'to' hierarchy");
                return None;
            }
        };

        let dest_mapping = self.establisher.establish_mapping(
            meta.out_device,
            &tuple.dst_addr,
            tuple.dst_port,
            &to_chain,
            meta.dst_link_addr,
        )?;

        let direction = if meta.is_routed {
            Direction::Routed
        } else {
            Direction::Bridged
        };

        let candidate = Arc::new(Connection::new(
            self.store.next_serial(),
            *tuple,
            direction,
            src_mapping,
            dest_mapping,
            can_accel,
            self.control.limits(),
            self.store.generation(),
        ));
        candidate.set_from_chain(from_chain);
        candidate.set_to_chain(to_chain);
        candidate.set_timer_group(initial_timer_group(class));

        if !self.classifiers.assign_full(&candidate) {
            return None;
        }

        // More than one packet for a brand-new flow may race here;
        // commit re-checks under the store lock and the losing
        // candidate is simply dropped.
        match self.store.commit(candidate) {
            CommitOutcome::Inserted(conn) => {
                tracing::info!(serial = conn.serial(), %tuple, class = class.as_str(),
                    "new connection");
                Some(conn)
            }
            CommitOutcome::Lost(existing) => Some(existing),
        }
    }

    /// Classifier generation moved on: rebuild the interface
    /// hierarchies (paths may have changed, e.g. a LAG slave swap) and
    /// attempt reclassification. Returns false when the packet must
    /// not be processed further.
    fn regenerate(&self, meta: &PacketMeta, conn: &Arc<Connection>) -> bool {
        let tuple = conn.tuple();
        tracing::debug!(serial = conn.serial(), "generation change, regenerating");

        let from_chain = match self.resolver.construct(&HierarchyRequest {
            src_addr: tuple.dst_addr,
            dst_addr: tuple.src_addr,
            protocol: tuple.protocol,
            given_dest: Some(meta.in_device),
            given_src: Some(meta.in_device),
            is_routed: meta.is_routed,
            dst_node_mac: meta.src_link_addr,
            src_node_mac: meta.dst_link_addr,
        }) {
            Ok(chain) => chain,
            Err(err) => {
                tracing::debug!(serial = conn.serial(), %err, "regen: no 'from' hierarchy");
                return false;
            }
        };
        conn.set_from_chain(from_chain);

        let to_chain = match self.resolver.construct(&HierarchyRequest {
            src_addr: tuple.src_addr,
            dst_addr: tuple.dst_addr,
            protocol: tuple.protocol,
            given_dest: Some(meta.out_device),
            given_src: Some(meta.in_device),
            is_routed: meta.is_routed,
            dst_node_mac: meta.dst_link_addr,
            src_node_mac: meta.src_link_addr,
        }) {
            Ok(chain) => chain,
            Err(err) => {
                tracing::debug!(serial = conn.serial(), %err, "regen: no 'to' hierarchy");
                return false;
            }
        };
        conn.set_to_chain(to_chain);

        if !self.classifiers.reclassify_allowed(conn) {
            // Denied: keep running with the current assignments and
            // leave the recorded generation stale so a later packet
            // tries again.
            tracing::debug!(serial = conn.serial(), "reclassification denied");
            return true;
        }

        if !self.classifiers.reclassify(conn) {
            tracing::warn!(serial = conn.serial(), "reclassification failed, dropping packet");
            return false;
        }

        conn.set_generation(self.store.generation());
        true
    }

    // ── Conntrack events ──────────────────────────────────────────

    /// The tracking subsystem destroyed its entry: decelerate and make
    /// the connection defunct so teardown releases the last reference.
    pub fn conntrack_destroy_event(&self, tuple: &FlowTuple) {
        if self.control.stopped() {
            return;
        }
        let lookup = self
            .conntrack
            .original_tuple(tuple)
            .unwrap_or(*tuple);
        let Some(conn) = self.store.find(&lookup) else {
            return;
        };
        tracing::debug!(serial = conn.serial(), "conntrack destroy, connection defunct");
        self.engine.decelerate(&conn);
        conn.make_defunct();
        match conn.accel().mode() {
            // A destroy (or deferred decelerate) is in flight; the
            // acknowledgement handler drops the stored record once the
            // accelerated counters have settled.
            AccelMode::DecelPending | AccelMode::AccelPending => {}
            _ => {
                self.store.remove(&lookup);
            }
        }
    }

    /// The tracking subsystem changed a connection mark. Transitions
    /// to zero are ignored.
    pub fn conntrack_mark_event(&self, tuple: &FlowTuple, mark: u32) {
        if self.control.stopped() || mark == 0 {
            return;
        }
        let lookup = self
            .conntrack
            .original_tuple(tuple)
            .unwrap_or(*tuple);
        let Some(conn) = self.store.find(&lookup) else {
            return;
        };
        if let Some(classifier) = conn.find_assigned(ClassifierKind::Mark) {
            classifier.mark_changed(mark);
        }
    }
}

impl PacketHookPort for PacketDispatcher {
    fn process(&self, packet: &PacketMeta) -> HookAction {
        self.process_inner(packet);
        HookAction::Accept
    }
}
