use domain::common::entity::FlowTuple;
use domain::conn::entity::{ConnSync, TcpState, TcpWindowSnapshot};

/// Secondary port over the connection-tracking subsystem.
///
/// Mutating methods default to no-ops so deployments without a
/// tracking table (pure bridging) satisfy the port trivially.
pub trait ConntrackPort: Send + Sync {
    /// The tracked tuple in its original orientation, if this flow is
    /// tracked. Reply-direction packets resolve to the same tuple as
    /// originals.
    fn original_tuple(&self, tuple: &FlowTuple) -> Option<FlowTuple>;

    fn tcp_state(&self, tuple: &FlowTuple) -> Option<TcpState>;

    /// The tracked TCP connection is in a terminating state; no new
    /// managed connection should be created for it.
    fn is_terminating(&self, _tuple: &FlowTuple) -> bool {
        false
    }

    /// The UDP socket under this flow is an L2TP tunnel encapsulation.
    fn is_l2tp_encap(&self, _tuple: &FlowTuple) -> bool {
        false
    }

    /// A conntrack helper (ALG) is attached; the flow needs slow-path
    /// assistance and must not be offloaded.
    fn has_helper(&self, _tuple: &FlowTuple) -> bool {
        false
    }

    /// Credit byte/packet totals the fast path carried.
    fn credit_totals(&self, _tuple: &FlowTuple, _sync: &ConnSync) {}

    /// Push the idle timeout out by the sync's elapsed ticks.
    fn extend_timeout(&self, _tuple: &FlowTuple, _inc_ms: u64) {}

    /// Fold a fast-path window snapshot into the tracked state; values
    /// only ever advance, never regress.
    fn merge_tcp_window(&self, _tuple: &FlowTuple, _snap: &TcpWindowSnapshot) {}
}
