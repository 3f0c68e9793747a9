use std::sync::Arc;

use crate::common::entity::{PacketView, Sender};
use crate::conn::entity::{ConnSync, Connection};
use crate::rule::entity::OffloadRule;

use super::entity::{ClassifierKind, ClassifierResponse};

/// A pluggable policy component consulted for every packet of an
/// assigned connection.
///
/// Classifiers run with no connection or state-machine lock held;
/// consistency of their own state is their responsibility.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ClassifierKind;

    fn process(&self, sender: Sender, packet: &PacketView) -> ClassifierResponse;

    /// Classifier plugin configuration changed; re-evaluate cached
    /// decisions.
    fn reclassify(&self) {}

    /// Whether a reclassification pass may run right now.
    fn reclassify_allowed(&self) -> bool {
        true
    }

    /// Statistics push from the fast path for this connection.
    fn sync_to(&self, _sync: &ConnSync) {}

    /// Contribute rule fields just before submission. Hooks run in
    /// ascending priority order so a higher-priority classifier
    /// overwrites an earlier one's contribution for the same field.
    fn sync_from(&self, _rule: &mut OffloadRule) {}

    /// The tracking subsystem changed the connection mark.
    fn mark_changed(&self, _mark: u32) {}
}

/// Instantiates classifiers when a connection is created or when a
/// reclassification pass refills self-unassigned slots.
pub trait ClassifierFactory: Send + Sync {
    /// Returns `None` when the plugin cannot attach right now; the
    /// caller must treat the assignment set as incomplete.
    fn create(&self, kind: ClassifierKind, conn: &Arc<Connection>) -> Option<Arc<dyn Classifier>>;
}
