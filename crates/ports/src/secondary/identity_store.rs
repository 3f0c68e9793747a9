use std::net::Ipv6Addr;
use std::sync::Arc;

use domain::common::entity::MacAddr;
use domain::conn::entity::{Host, Mapping, Node};

/// Secondary port for the shared node/host/mapping records.
///
/// The `*_commit` calls implement double-checked creation: the caller
/// looks up unlocked, allocates a candidate on miss, and commit
/// re-checks under the store's lock. If another execution context got
/// there first the existing record is returned and the candidate is
/// dropped.
pub trait IdentityStorePort: Send + Sync {
    fn node_find(&self, mac: &MacAddr) -> Option<Arc<Node>>;

    fn node_commit(&self, candidate: Arc<Node>) -> Arc<Node>;

    fn host_find(&self, addr: &Ipv6Addr) -> Option<Arc<Host>>;

    fn host_commit(&self, candidate: Arc<Host>) -> Arc<Host>;

    fn mapping_find(&self, addr: &Ipv6Addr, port: i32) -> Option<Arc<Mapping>>;

    fn mapping_commit(&self, candidate: Arc<Mapping>) -> Arc<Mapping>;
}
