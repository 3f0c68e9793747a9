use crate::secondary::metrics_port::{AccelMetrics, ConfigMetrics, EventMetrics, PacketMetrics};

/// No-op implementation of all metrics sub-traits for use in tests.
pub struct NoopMetrics;

impl PacketMetrics for NoopMetrics {}
impl AccelMetrics for NoopMetrics {}
impl ConfigMetrics for NoopMetrics {}
impl EventMetrics for NoopMetrics {}
