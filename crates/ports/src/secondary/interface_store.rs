use std::sync::Arc;

use domain::iface::entity::{DeviceId, Interface};

/// Secondary port for the shared interface table.
///
/// Interfaces are looked up or created by device identity and are
/// never owned exclusively by one connection; `Arc` handles carry the
/// reference discipline.
pub trait InterfaceStorePort: Send + Sync {
    /// Find-or-create, double-checked so concurrent establishers for
    /// the same device converge on one record.
    fn establish(&self, descriptor: Interface) -> Arc<Interface>;

    fn find(&self, device: DeviceId) -> Option<Arc<Interface>>;

    fn len(&self) -> usize;
}
