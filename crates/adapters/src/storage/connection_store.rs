use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use domain::common::entity::FlowTuple;
use domain::conn::entity::Connection;
use ports::secondary::connection_store::{CommitOutcome, ConnectionStorePort};

#[derive(Default)]
struct Tables {
    by_tuple: HashMap<FlowTuple, Arc<Connection>>,
    by_serial: HashMap<u32, Arc<Connection>>,
}

/// In-memory connection database.
///
/// One short-held lock covers both indexes so `commit` can re-check
/// and insert atomically; packet-path lookups take the same lock for
/// the duration of a map probe only.
pub struct InMemoryConnectionStore {
    tables: Mutex<Tables>,
    serial: AtomicU32,
    generation: AtomicU32,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            serial: AtomicU32::new(1),
            generation: AtomicU32::new(0),
        }
    }
}

impl Default for InMemoryConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStorePort for InMemoryConnectionStore {
    fn find(&self, tuple: &FlowTuple) -> Option<Arc<Connection>> {
        self.tables
            .lock()
            .expect("store lock poisoned")
            .by_tuple
            .get(tuple)
            .cloned()
    }

    fn find_by_serial(&self, serial: u32) -> Option<Arc<Connection>> {
        self.tables
            .lock()
            .expect("store lock poisoned")
            .by_serial
            .get(&serial)
            .cloned()
    }

    fn commit(&self, candidate: Arc<Connection>) -> CommitOutcome {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let tuple = candidate.tuple();
        if let Some(existing) = tables.by_tuple.get(&tuple) {
            // Another packet context created this flow first; the
            // candidate is discarded by the caller.
            return CommitOutcome::Lost(Arc::clone(existing));
        }
        tables.by_tuple.insert(tuple, Arc::clone(&candidate));
        tables
            .by_serial
            .insert(candidate.serial(), Arc::clone(&candidate));
        CommitOutcome::Inserted(candidate)
    }

    fn remove(&self, tuple: &FlowTuple) -> Option<Arc<Connection>> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let conn = tables.by_tuple.remove(tuple)?;
        tables.by_serial.remove(&conn.serial());
        Some(conn)
    }

    fn len(&self) -> usize {
        self.tables.lock().expect("store lock poisoned").by_tuple.len()
    }

    fn next_serial(&self) -> u32 {
        self.serial.fetch_add(1, Ordering::Relaxed)
    }

    fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
