/// Default port for the Prometheus scrape endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9470;

/// Default capacity of the inbound offload event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
