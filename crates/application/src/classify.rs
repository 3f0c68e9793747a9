use std::sync::Arc;

use domain::classifier::aggregator::VerdictAccumulator;
use domain::classifier::entity::{AggregateVerdict, ClassifierKind, Relevance};
use domain::classifier::plugin::ClassifierFactory;
use domain::common::entity::{PacketView, QosTags, Sender};
use domain::conn::entity::Connection;
use ports::secondary::metrics_port::MetricsPort;

/// Runs the ordered classifier list over packets and keeps assignments
/// complete across classifier-generation changes.
pub struct ClassifierRuntime {
    factory: Arc<dyn ClassifierFactory>,
    metrics: Arc<dyn MetricsPort>,
}

impl ClassifierRuntime {
    pub fn new(factory: Arc<dyn ClassifierFactory>, metrics: Arc<dyn MetricsPort>) -> Self {
        Self { factory, metrics }
    }

    /// Give a fresh connection its full complement of classifiers.
    /// Returns false if any type fails to instantiate; the caller must
    /// then abandon the connection rather than run it half-covered.
    pub fn assign_full(&self, conn: &Arc<Connection>) -> bool {
        for kind in ClassifierKind::ALL {
            match self.factory.create(kind, conn) {
                Some(classifier) => conn.assign(classifier),
                None => {
                    tracing::warn!(serial = conn.serial(), %kind, "classifier unavailable");
                    return false;
                }
            }
        }
        true
    }

    /// Consult every assigned classifier for this packet and merge the
    /// responses. Classifiers that report themselves irrelevant are
    /// unassigned on the spot (the default one is permanent).
    ///
    /// Classifiers run unlocked; consistency of their own state is
    /// their responsibility.
    pub fn process(
        &self,
        conn: &Arc<Connection>,
        sender: Sender,
        packet: &PacketView,
    ) -> AggregateVerdict {
        let initial_qos = QosTags {
            flow_tag: packet.priority,
            return_tag: packet.priority,
        };
        let mut acc = VerdictAccumulator::new(initial_qos, conn.timer_group());

        for classifier in conn.assignments() {
            let response = classifier.process(sender, packet);
            if response.relevance() == Relevance::No {
                if classifier.kind() != ClassifierKind::Default {
                    tracing::debug!(
                        serial = conn.serial(),
                        kind = %classifier.kind(),
                        "classifier not relevant, unassigning"
                    );
                    conn.unassign(classifier.kind());
                }
                continue;
            }
            acc.absorb(&response);
        }

        acc.finish()
    }

    /// Whether every assigned classifier permits a reclassification
    /// pass right now.
    pub fn reclassify_allowed(&self, conn: &Arc<Connection>) -> bool {
        conn.assignments().iter().all(|c| c.reclassify_allowed())
    }

    /// Reclassify every assigned classifier, then refill any types that
    /// previously unassigned themselves. Returns false if a required
    /// type cannot be instantiated; the caller must drop the packet
    /// rather than proceed with inconsistent coverage.
    pub fn reclassify(&self, conn: &Arc<Connection>) -> bool {
        let assignments = conn.assignments();
        let mut full = true;
        let mut expected = 0usize;

        for classifier in &assignments {
            classifier.reclassify();

            // Assignments track kind ordinals 1:1 when complete; a gap
            // means the type self-unassigned earlier and must come back.
            let ordinal = classifier.kind().ordinal();
            while expected < ordinal {
                if !self.instantiate(conn, expected) {
                    full = false;
                }
                expected += 1;
            }
            expected = ordinal + 1;
        }

        while expected < ClassifierKind::ALL.len() {
            if !self.instantiate(conn, expected) {
                full = false;
            }
            expected += 1;
        }

        if !full {
            self.metrics.record_config_reload("incomplete");
        }
        full
    }

    fn instantiate(&self, conn: &Arc<Connection>, ordinal: usize) -> bool {
        let Some(kind) = ClassifierKind::from_ordinal(ordinal) else {
            return false;
        };
        tracing::debug!(serial = conn.serial(), %kind, "re-instantiating classifier");
        match self.factory.create(kind, conn) {
            Some(classifier) => {
                conn.assign(classifier);
                true
            }
            None => false,
        }
    }
}
