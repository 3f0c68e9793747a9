// Focused sub-traits for recording metrics, grouped by concern.
//
// All methods take `&self`; implementations use interior mutability.
// Defaults are no-ops so test mocks only implement what they assert.

// ── Packet path ────────────────────────────────────────────────────

pub trait PacketMetrics: Send + Sync {
    /// Record a processed packet with protocol-class and action labels.
    fn record_packet(&self, _class: &str, _action: &str) {}
}

// ── Acceleration lifecycle ─────────────────────────────────────────

pub trait AccelMetrics: Send + Sync {
    /// Gauge of currently accelerated connections per transport class.
    fn set_accelerated(&self, _class: &str, _count: u64) {}

    /// Result label: submitted, bad_rule, driver_fail, ineligible.
    fn record_accel_attempt(&self, _result: &str) {}

    fn record_nack(&self) {}

    /// Fast-path-initiated flush or eviction.
    fn record_eviction(&self) {}

    fn record_driver_failure(&self) {}
}

// ── Configuration ──────────────────────────────────────────────────

pub trait ConfigMetrics: Send + Sync {
    fn record_config_reload(&self, _result: &str) {}
}

// ── Event pipeline ─────────────────────────────────────────────────

pub trait EventMetrics: Send + Sync {
    fn record_event_dropped(&self, _reason: &str) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing the concern-specific sub-traits.
pub trait MetricsPort: PacketMetrics + AccelMetrics + ConfigMetrics + EventMetrics {}

/// Blanket implementation: implementing all sub-traits implements the
/// composite.
impl<T> MetricsPort for T where T: PacketMetrics + AccelMetrics + ConfigMetrics + EventMetrics {}
