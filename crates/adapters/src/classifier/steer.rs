use domain::classifier::entity::{ClassifierKind, ClassifierResponse, Relevance};
use domain::classifier::plugin::Classifier;
use domain::common::entity::{Direction, PacketView, Sender};

/// Flow steering only concerns bridged traffic between ports; on
/// routed connections it reports itself irrelevant and is unassigned.
pub struct SteerClassifier {
    direction: Direction,
}

impl SteerClassifier {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl Classifier for SteerClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Steer
    }

    fn process(&self, _sender: Sender, _packet: &PacketView) -> ClassifierResponse {
        match self.direction {
            Direction::Bridged => ClassifierResponse::relevant(Relevance::Yes),
            Direction::Routed => ClassifierResponse::relevant(Relevance::No),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irrelevant_on_routed_connections() {
        let c = SteerClassifier::new(Direction::Routed);
        let response = c.process(Sender::Src, &PacketView::default());
        assert_eq!(response.relevance, Some(Relevance::No));
    }

    #[test]
    fn relevant_on_bridged_connections() {
        let c = SteerClassifier::new(Direction::Bridged);
        let response = c.process(Sender::Src, &PacketView::default());
        assert_eq!(response.relevance, Some(Relevance::Yes));
    }
}
