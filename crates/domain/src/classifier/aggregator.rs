use crate::common::entity::{DscpMarking, QosTags, TimerGroup};

use super::entity::{AccelPermit, AggregateVerdict, ClassifierResponse, Relevance};

/// Merges per-classifier responses into one verdict.
///
/// Precedence, with classifiers absorbed in ascending priority order:
/// - drop from any classifier wins;
/// - acceleration needs unanimous consent: a `Maybe` relevance or an
///   explicit deny from anyone forces it off for this packet;
/// - QoS tags, DSCP and timer group are last-writer-wins, so the
///   highest-priority classifier with an opinion prevails;
/// - a DSCP veto from any classifier permanently discards remark
///   requests for the rest of the pass, regardless of order.
#[derive(Debug)]
pub struct VerdictAccumulator {
    drop: bool,
    accel: bool,
    qos: QosTags,
    dscp: Option<DscpMarking>,
    dscp_denied: bool,
    timer_group: Option<TimerGroup>,
}

impl VerdictAccumulator {
    /// `initial_qos` seeds both tags from the packet's own priority;
    /// `initial_timer_group` is the connection's current group.
    pub fn new(initial_qos: QosTags, initial_timer_group: Option<TimerGroup>) -> Self {
        Self {
            drop: false,
            accel: true,
            qos: initial_qos,
            dscp: None,
            dscp_denied: false,
            timer_group: initial_timer_group,
        }
    }

    pub fn absorb(&mut self, response: &ClassifierResponse) {
        match response.relevance() {
            Relevance::No => {
                // Caller unassigns; nothing from this response counts.
                return;
            }
            Relevance::Maybe => {
                // Classifier not sure of its relevance yet; hold off.
                self.accel = false;
            }
            Relevance::Yes => {
                if response.accel == Some(AccelPermit::Deny) {
                    self.accel = false;
                }
            }
        }

        if response.drop {
            self.drop = true;
        }

        if let Some(group) = response.timer_group {
            self.timer_group = Some(group);
        }

        if let Some(qos) = response.qos {
            self.qos = qos;
        }

        if response.deny_dscp {
            self.dscp_denied = true;
            self.dscp = None;
        }

        if let Some(dscp) = response.dscp
            && !self.dscp_denied
        {
            self.dscp = Some(dscp);
        }
    }

    pub fn finish(self) -> AggregateVerdict {
        AggregateVerdict {
            drop: self.drop,
            accel: self.accel,
            qos: self.qos,
            dscp: self.dscp,
            timer_group: self.timer_group,
        }
    }
}
