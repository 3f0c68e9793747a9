pub mod connection_store;
pub mod conntrack_port;
pub mod device_port;
pub mod identity_store;
pub mod interface_store;
pub mod metrics_port;
pub mod neighbor_port;
pub mod offload_port;
pub mod route_port;
