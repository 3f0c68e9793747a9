use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use domain::iface::entity::{DeviceId, Interface};
use ports::secondary::interface_store::InterfaceStorePort;

/// In-memory shared interface table keyed by device identity.
pub struct InMemoryInterfaceStore {
    table: Mutex<HashMap<DeviceId, Arc<Interface>>>,
}

impl InMemoryInterfaceStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryInterfaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceStorePort for InMemoryInterfaceStore {
    fn establish(&self, descriptor: Interface) -> Arc<Interface> {
        let mut table = self.table.lock().expect("interface lock poisoned");
        if let Some(existing) = table.get(&descriptor.device) {
            // Device attributes can drift (MTU, VLAN re-config); the
            // walk sees the latest snapshot.
            if **existing == descriptor {
                return Arc::clone(existing);
            }
        }
        let iface = Arc::new(descriptor);
        table.insert(iface.device, Arc::clone(&iface));
        iface
    }

    fn find(&self, device: DeviceId) -> Option<Arc<Interface>> {
        self.table
            .lock()
            .expect("interface lock poisoned")
            .get(&device)
            .cloned()
    }

    fn len(&self) -> usize {
        self.table.lock().expect("interface lock poisoned").len()
    }
}
