use std::sync::atomic::{AtomicU32, Ordering};

use domain::classifier::entity::{ClassifierKind, ClassifierResponse, Relevance};
use domain::classifier::plugin::Classifier;
use domain::common::entity::{PacketView, QosTags, Sender};

/// Maps connection marks pushed in by the tracking subsystem onto QoS
/// tags. With no mark set it stays assigned but voices no opinion.
pub struct MarkClassifier {
    mark: AtomicU32,
}

impl MarkClassifier {
    pub fn new() -> Self {
        Self {
            mark: AtomicU32::new(0),
        }
    }
}

impl Default for MarkClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for MarkClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Mark
    }

    fn process(&self, _sender: Sender, _packet: &PacketView) -> ClassifierResponse {
        let mark = self.mark.load(Ordering::Acquire);
        if mark == 0 {
            return ClassifierResponse::relevant(Relevance::Yes);
        }
        ClassifierResponse {
            qos: Some(QosTags {
                flow_tag: mark,
                return_tag: mark,
            }),
            ..ClassifierResponse::relevant(Relevance::Yes)
        }
    }

    fn mark_changed(&self, mark: u32) {
        tracing::debug!(mark, "connection mark updated");
        self.mark.store(mark, Ordering::Release);
    }
}
