use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use domain::common::entity::FlowTuple;
use domain::conn::entity::{ConnSync, TcpState, TcpWindowSnapshot};
use ports::secondary::conntrack_port::ConntrackPort;

#[derive(Default)]
struct Inner {
    tracked: HashSet<FlowTuple>,
    tcp: HashMap<FlowTuple, TcpState>,
    terminating: HashSet<FlowTuple>,
    l2tp: HashSet<FlowTuple>,
    helpers: HashSet<FlowTuple>,
    timeout_credit_ms: HashMap<FlowTuple, u64>,
}

/// Programmable stand-in for the connection-tracking subsystem.
pub struct SimConntrack {
    inner: Mutex<Inner>,
}

impl SimConntrack {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Track a flow in its original orientation.
    pub fn track(&self, tuple: FlowTuple) {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .tracked
            .insert(tuple);
    }

    pub fn set_tcp_state(&self, tuple: FlowTuple, state: TcpState) {
        let mut inner = self.inner.lock().expect("conntrack lock poisoned");
        inner.tracked.insert(tuple);
        inner.tcp.insert(tuple, state);
    }

    pub fn set_terminating(&self, tuple: FlowTuple) {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .terminating
            .insert(tuple);
    }

    pub fn set_l2tp_encap(&self, tuple: FlowTuple) {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .l2tp
            .insert(tuple);
    }

    pub fn set_helper(&self, tuple: FlowTuple) {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .helpers
            .insert(tuple);
    }

    pub fn timeout_credit_ms(&self, tuple: &FlowTuple) -> u64 {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .timeout_credit_ms
            .get(tuple)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for SimConntrack {
    fn default() -> Self {
        Self::new()
    }
}

impl ConntrackPort for SimConntrack {
    fn original_tuple(&self, tuple: &FlowTuple) -> Option<FlowTuple> {
        let inner = self.inner.lock().expect("conntrack lock poisoned");
        if inner.tracked.contains(tuple) {
            return Some(*tuple);
        }
        let reversed = tuple.reversed();
        inner.tracked.contains(&reversed).then_some(reversed)
    }

    fn tcp_state(&self, tuple: &FlowTuple) -> Option<TcpState> {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .tcp
            .get(tuple)
            .copied()
    }

    fn is_terminating(&self, tuple: &FlowTuple) -> bool {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .terminating
            .contains(tuple)
    }

    fn is_l2tp_encap(&self, tuple: &FlowTuple) -> bool {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .l2tp
            .contains(tuple)
    }

    fn has_helper(&self, tuple: &FlowTuple) -> bool {
        self.inner
            .lock()
            .expect("conntrack lock poisoned")
            .helpers
            .contains(tuple)
    }

    fn credit_totals(&self, _tuple: &FlowTuple, _sync: &ConnSync) {}

    fn extend_timeout(&self, tuple: &FlowTuple, inc_ms: u64) {
        *self
            .inner
            .lock()
            .expect("conntrack lock poisoned")
            .timeout_credit_ms
            .entry(*tuple)
            .or_insert(0) += inc_ms;
    }

    fn merge_tcp_window(&self, tuple: &FlowTuple, snap: &TcpWindowSnapshot) {
        let mut inner = self.inner.lock().expect("conntrack lock poisoned");
        let Some(state) = inner.tcp.get_mut(tuple) else {
            return;
        };
        // Values only advance, never regress.
        let flow = &mut state.seen[0];
        flow.max_window = flow.max_window.max(snap.flow_max_window);
        if (flow.end.wrapping_sub(snap.flow_end) as i32) < 0 {
            flow.end = snap.flow_end;
        }
        if (flow.max_end.wrapping_sub(snap.flow_max_end) as i32) < 0 {
            flow.max_end = snap.flow_max_end;
        }
        let ret = &mut state.seen[1];
        ret.max_window = ret.max_window.max(snap.return_max_window);
        if (ret.end.wrapping_sub(snap.return_end) as i32) < 0 {
            ret.end = snap.return_end;
        }
        if (ret.max_end.wrapping_sub(snap.return_max_end) as i32) < 0 {
            ret.max_end = snap.return_max_end;
        }
    }
}
