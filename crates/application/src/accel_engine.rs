use std::sync::Arc;

use domain::accel::counters::AcceleratedCounts;
use domain::accel::entity::{CeaseOutcome, DecelDisposition};
use domain::classifier::entity::AggregateVerdict;
use domain::common::entity::{PROTO_IPIP, ProtoClass};
use domain::conn::entity::Connection;
use domain::rule::builder::{self, RuleInputs, RuleSettings};
use ports::secondary::conntrack_port::ConntrackPort;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::offload_port::{OffloadPort, OffloadResponse};

/// Drives the per-connection acceleration state machine: builds and
/// submits offload rules, processes the asynchronous acknowledgements,
/// and keeps the global accelerated counters honest.
///
/// No lock is held across a transport submit or a classifier hook;
/// only the context's own state flag is protected while transitioning.
pub struct AccelEngine {
    offload: Arc<dyn OffloadPort>,
    conntrack: Arc<dyn ConntrackPort>,
    counters: Arc<AcceleratedCounts>,
    metrics: Arc<dyn MetricsPort>,
    settings: RuleSettings,
}

impl AccelEngine {
    pub fn new(
        offload: Arc<dyn OffloadPort>,
        conntrack: Arc<dyn ConntrackPort>,
        counters: Arc<AcceleratedCounts>,
        metrics: Arc<dyn MetricsPort>,
        settings: RuleSettings,
    ) -> Self {
        Self {
            offload,
            conntrack,
            counters,
            metrics,
            settings,
        }
    }

    pub fn counters(&self) -> &Arc<AcceleratedCounts> {
        &self.counters
    }

    /// Attempt to accelerate. A no-op unless the connection is exactly
    /// in the not-accelerated, eligible state.
    pub fn accelerate(&self, conn: &Arc<Connection>, verdict: &AggregateVerdict) {
        let ctx = conn.accel();
        if !ctx.try_begin_accel() {
            tracing::trace!(serial = conn.serial(), mode = %ctx.mode(), "accel ignored");
            return;
        }

        // Among non-ported protocols only IP-in-IP can be described to
        // the fast path.
        if conn.proto_class() == ProtoClass::NonPorted && conn.tuple().protocol != PROTO_IPIP {
            tracing::debug!(
                serial = conn.serial(),
                protocol = conn.tuple().protocol,
                "unsupported non-ported protocol"
            );
            ctx.fail_rule();
            self.metrics.record_accel_attempt("bad_rule");
            return;
        }

        let from_chain = conn.from_chain();
        let to_chain = conn.to_chain();
        let tcp_state = if conn.proto_class() == ProtoClass::Tcp {
            self.conntrack.tcp_state(&conn.tuple())
        } else {
            None
        };

        let inputs = RuleInputs {
            tuple: conn.tuple(),
            routed: conn.direction().is_routed(),
            from_chain: &from_chain,
            to_chain: &to_chain,
            from_node_mac: conn.from_node_mac(),
            to_node_mac: conn.to_node_mac(),
            tcp: tcp_state.as_ref(),
        };

        let mut rule = match builder::build(&inputs, verdict, &self.settings) {
            Ok(rule) => rule,
            Err(err) => {
                tracing::warn!(serial = conn.serial(), %err, "accel failed, bad rule");
                ctx.fail_rule();
                self.metrics.record_accel_attempt("bad_rule");
                return;
            }
        };

        // Ascending priority order: the highest-priority classifier's
        // contribution lands last and wins for any contested field.
        for classifier in conn.assignments() {
            classifier.sync_from(&mut rule);
        }

        match self.offload.submit_create(&rule, conn.serial()) {
            Ok(()) => {
                ctx.submit_ok();
                self.metrics.record_accel_attempt("submitted");
            }
            Err(err) => {
                tracing::warn!(serial = conn.serial(), %err, "create submit rejected");
                self.metrics.record_driver_failure();
                if ctx.submit_failed() {
                    tracing::warn!(serial = conn.serial(), "driver fail limit reached");
                    self.metrics.record_accel_attempt("driver_fail");
                }
            }
        }
    }

    /// Remove the flow from the fast path. Racing a pending create is
    /// handled by deferring: the intent is recorded once and actioned
    /// by the create acknowledgement handler.
    pub fn decelerate(&self, conn: &Arc<Connection>) {
        let ctx = conn.accel();
        match ctx.request_decel() {
            DecelDisposition::AlreadyPending | DecelDisposition::NotAccelerated => {}
            DecelDisposition::Deferred => {
                tracing::debug!(serial = conn.serial(), "decelerate deferred, create in flight");
            }
            DecelDisposition::Begin => {
                match self.offload.submit_destroy(&conn.tuple(), conn.serial()) {
                    Ok(()) => ctx.submit_ok(),
                    Err(err) => {
                        tracing::warn!(serial = conn.serial(), %err, "destroy submit rejected");
                        self.metrics.record_driver_failure();
                        if ctx.submit_failed() {
                            tracing::warn!(serial = conn.serial(), "driver fail limit reached");
                        }
                    }
                }
            }
        }
    }

    pub fn on_create_response(&self, conn: &Arc<Connection>, response: OffloadResponse) {
        let ctx = conn.accel();
        match response {
            OffloadResponse::Nack => {
                tracing::debug!(serial = conn.serial(), "create nacked");
                ctx.create_nacked();
                self.metrics.record_nack();
            }
            OffloadResponse::Ack => {
                self.counters.increment(conn.proto_class());
                self.publish_gauges();
                if ctx.create_acked() {
                    // A decelerate arrived while the create was in
                    // flight; action it now that there is something to
                    // decelerate.
                    tracing::debug!(serial = conn.serial(), "actioning deferred decelerate");
                    self.decelerate(conn);
                }
            }
        }
    }

    pub fn on_destroy_response(&self, conn: &Arc<Connection>, response: OffloadResponse) {
        let ctx = conn.accel();
        let acked = response == OffloadResponse::Ack;
        if !ctx.destroy_response(acked) {
            // The fast path ended acceleration out of band (flush);
            // the payload is stale.
            tracing::debug!(serial = conn.serial(), "stale destroy response ignored");
            return;
        }
        self.counters.decrement(conn.proto_class());
        self.publish_gauges();
    }

    /// Fast-path-initiated eviction. Manager-initiated deceleration
    /// never comes through here.
    pub fn accel_ceased(&self, conn: &Arc<Connection>) {
        match conn.accel().accel_ceased() {
            CeaseOutcome::Ignored => {}
            CeaseOutcome::Decelerated => {
                self.counters.decrement(conn.proto_class());
                self.metrics.record_eviction();
                self.publish_gauges();
            }
            CeaseOutcome::FailedNoAction => {
                tracing::warn!(serial = conn.serial(), "no-action limit reached");
                self.counters.decrement(conn.proto_class());
                self.metrics.record_eviction();
                self.publish_gauges();
            }
        }
    }

    /// The stats path saw offloaded traffic: the rule is doing work.
    pub fn action_seen(&self, conn: &Arc<Connection>) {
        conn.accel().action_seen();
    }

    fn publish_gauges(&self) {
        for class in [ProtoClass::Tcp, ProtoClass::Udp, ProtoClass::NonPorted] {
            self.metrics
                .set_accelerated(class.as_str(), self.counters.get(class));
        }
        self.metrics.set_accelerated("total", self.counters.total());
    }
}
