use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};

use domain::common::entity::MacAddr;
use domain::conn::entity::{Host, Mapping, Node};
use ports::secondary::identity_store::IdentityStorePort;

#[derive(Default)]
struct Tables {
    nodes: HashMap<MacAddr, Arc<Node>>,
    hosts: HashMap<Ipv6Addr, Arc<Host>>,
    mappings: HashMap<(Ipv6Addr, i32), Arc<Mapping>>,
}

/// In-memory node/host/mapping store with double-checked commits:
/// the commit re-checks under the lock and a racing creator's
/// candidate is dropped in favour of the record already present.
pub struct InMemoryIdentityStore {
    tables: Mutex<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.tables.lock().expect("identity lock poisoned").nodes.len()
    }

    pub fn host_count(&self) -> usize {
        self.tables.lock().expect("identity lock poisoned").hosts.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.tables
            .lock()
            .expect("identity lock poisoned")
            .mappings
            .len()
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStorePort for InMemoryIdentityStore {
    fn node_find(&self, mac: &MacAddr) -> Option<Arc<Node>> {
        self.tables
            .lock()
            .expect("identity lock poisoned")
            .nodes
            .get(mac)
            .cloned()
    }

    fn node_commit(&self, candidate: Arc<Node>) -> Arc<Node> {
        let mut tables = self.tables.lock().expect("identity lock poisoned");
        if let Some(existing) = tables.nodes.get(&candidate.mac) {
            return Arc::clone(existing);
        }
        tables.nodes.insert(candidate.mac, Arc::clone(&candidate));
        candidate
    }

    fn host_find(&self, addr: &Ipv6Addr) -> Option<Arc<Host>> {
        self.tables
            .lock()
            .expect("identity lock poisoned")
            .hosts
            .get(addr)
            .cloned()
    }

    fn host_commit(&self, candidate: Arc<Host>) -> Arc<Host> {
        let mut tables = self.tables.lock().expect("identity lock poisoned");
        if let Some(existing) = tables.hosts.get(&candidate.addr) {
            return Arc::clone(existing);
        }
        tables.hosts.insert(candidate.addr, Arc::clone(&candidate));
        candidate
    }

    fn mapping_find(&self, addr: &Ipv6Addr, port: i32) -> Option<Arc<Mapping>> {
        self.tables
            .lock()
            .expect("identity lock poisoned")
            .mappings
            .get(&(*addr, port))
            .cloned()
    }

    fn mapping_commit(&self, candidate: Arc<Mapping>) -> Arc<Mapping> {
        let mut tables = self.tables.lock().expect("identity lock poisoned");
        let key = (candidate.addr, candidate.port);
        if let Some(existing) = tables.mappings.get(&key) {
            return Arc::clone(existing);
        }
        tables.mappings.insert(key, Arc::clone(&candidate));
        candidate
    }
}
