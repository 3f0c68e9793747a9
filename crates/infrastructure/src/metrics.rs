use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use ports::secondary::metrics_port::{AccelMetrics, ConfigMetrics, EventMetrics, PacketMetrics};

// ── Label types ────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PacketLabels {
    pub class: String,
    pub action: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClassLabels {
    pub class: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

// ── Manager metrics registry ───────────────────────────────────────

/// Prometheus metrics registry for the manager.
///
/// All metric families use interior mutability (atomics), so recording
/// only requires `&self`; wrap in `Arc` for sharing.
pub struct ManagerMetrics {
    registry: Registry,
    pub packets_total: Family<PacketLabels, Counter>,
    pub accelerated: Family<ClassLabels, Gauge>,
    pub accel_attempts_total: Family<ResultLabels, Counter>,
    pub nacks_total: Counter,
    pub evictions_total: Counter,
    pub driver_failures_total: Counter,
    pub config_reloads_total: Family<ResultLabels, Counter>,
    pub events_dropped_total: Family<ReasonLabels, Counter>,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("flowaccel");

        let packets_total = Family::<PacketLabels, Counter>::default();
        registry.register(
            "packets",
            "Packets processed by the dispatcher",
            packets_total.clone(),
        );

        let accelerated = Family::<ClassLabels, Gauge>::default();
        registry.register(
            "accelerated_connections",
            "Connections currently offloaded to the fast path",
            accelerated.clone(),
        );

        let accel_attempts_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "accel_attempts",
            "Acceleration attempts by outcome",
            accel_attempts_total.clone(),
        );

        let nacks_total = Counter::default();
        registry.register(
            "create_nacks",
            "Rule creations nacked by the fast path",
            nacks_total.clone(),
        );

        let evictions_total = Counter::default();
        registry.register(
            "evictions",
            "Fast-path-initiated flushes and evictions",
            evictions_total.clone(),
        );

        let driver_failures_total = Counter::default();
        registry.register(
            "driver_failures",
            "Submit calls rejected by the offload transport",
            driver_failures_total.clone(),
        );

        let config_reloads_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "config_reloads",
            "Configuration reload attempts by result",
            config_reloads_total.clone(),
        );

        let events_dropped_total = Family::<ReasonLabels, Counter>::default();
        registry.register(
            "events_dropped",
            "Offload events dropped before processing",
            events_dropped_total.clone(),
        );

        Self {
            registry,
            packets_total,
            accelerated,
            accel_attempts_total,
            nacks_total,
            evictions_total,
            driver_failures_total,
            config_reloads_total,
            events_dropped_total,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Err(err) = prometheus_client::encoding::text::encode(&mut out, &self.registry) {
            tracing::warn!(%err, "metrics encoding failed");
        }
        out
    }
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketMetrics for ManagerMetrics {
    fn record_packet(&self, class: &str, action: &str) {
        self.packets_total
            .get_or_create(&PacketLabels {
                class: class.to_string(),
                action: action.to_string(),
            })
            .inc();
    }
}

impl AccelMetrics for ManagerMetrics {
    fn set_accelerated(&self, class: &str, count: u64) {
        self.accelerated
            .get_or_create(&ClassLabels {
                class: class.to_string(),
            })
            .set(count as i64);
    }

    fn record_accel_attempt(&self, result: &str) {
        self.accel_attempts_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_nack(&self) {
        self.nacks_total.inc();
    }

    fn record_eviction(&self) {
        self.evictions_total.inc();
    }

    fn record_driver_failure(&self) {
        self.driver_failures_total.inc();
    }
}

impl ConfigMetrics for ManagerMetrics {
    fn record_config_reload(&self, result: &str) {
        self.config_reloads_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }
}

impl EventMetrics for ManagerMetrics {
    fn record_event_dropped(&self, reason: &str) {
        self.events_dropped_total
            .get_or_create(&ReasonLabels {
                reason: reason.to_string(),
            })
            .inc();
    }
}
