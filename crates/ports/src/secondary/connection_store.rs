use std::sync::Arc;

use domain::common::entity::FlowTuple;
use domain::conn::entity::Connection;

/// Result of committing a candidate connection.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The candidate is now the stored record.
    Inserted(Arc<Connection>),
    /// Another execution context committed the same tuple first; the
    /// candidate must be discarded in favour of the returned record.
    Lost(Arc<Connection>),
}

impl CommitOutcome {
    pub fn connection(self) -> Arc<Connection> {
        match self {
            Self::Inserted(c) | Self::Lost(c) => c,
        }
    }
}

/// Secondary port for the connection database.
///
/// Creation is optimistically duplicated then deduplicated: callers
/// look up unlocked, build a full candidate on miss, and `commit`
/// re-checks under the store's lock before inserting.
///
/// The store also owns the global classifier-generation counter;
/// connections whose recorded generation lags it must be reclassified
/// before their next verdict.
pub trait ConnectionStorePort: Send + Sync {
    fn find(&self, tuple: &FlowTuple) -> Option<Arc<Connection>>;

    /// Fast lookup keyed by the serial carried through the offload
    /// transport as the completion token.
    fn find_by_serial(&self, serial: u32) -> Option<Arc<Connection>>;

    fn commit(&self, candidate: Arc<Connection>) -> CommitOutcome;

    fn remove(&self, tuple: &FlowTuple) -> Option<Arc<Connection>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serial for a candidate connection about to be built.
    fn next_serial(&self) -> u32;

    fn generation(&self) -> u32;

    /// Classifier plugin configuration changed somewhere; every
    /// connection must reclassify before its next verdict.
    fn bump_generation(&self);
}
