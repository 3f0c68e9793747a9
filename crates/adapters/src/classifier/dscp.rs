use domain::classifier::entity::{ClassifierKind, ClassifierResponse, Relevance};
use domain::classifier::plugin::Classifier;
use domain::common::entity::{DscpMarking, PacketView, Sender};

/// Requests a configured DSCP remark on every packet of the
/// connection; with no remark configured it has no opinion.
pub struct DscpClassifier {
    remark: Option<DscpMarking>,
}

impl DscpClassifier {
    pub fn new(remark: Option<DscpMarking>) -> Self {
        Self { remark }
    }
}

impl Classifier for DscpClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Dscp
    }

    fn process(&self, _sender: Sender, _packet: &PacketView) -> ClassifierResponse {
        ClassifierResponse {
            dscp: self.remark,
            ..ClassifierResponse::relevant(Relevance::Yes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_remark_is_requested() {
        let remark = DscpMarking {
            flow_dscp: 46,
            return_dscp: 34,
        };
        let c = DscpClassifier::new(Some(remark));
        let response = c.process(Sender::Src, &PacketView::default());
        assert_eq!(response.dscp, Some(remark));
    }

    #[test]
    fn unconfigured_has_no_opinion() {
        let c = DscpClassifier::new(None);
        let response = c.process(Sender::Src, &PacketView::default());
        assert!(response.dscp.is_none());
    }
}
