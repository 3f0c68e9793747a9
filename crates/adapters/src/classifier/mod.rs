mod default;
mod dscp;
mod mark;
mod steer;

pub use default::DefaultClassifier;
pub use dscp::DscpClassifier;
pub use mark::MarkClassifier;
pub use steer::SteerClassifier;

use std::sync::Arc;

use domain::classifier::entity::ClassifierKind;
use domain::classifier::plugin::{Classifier, ClassifierFactory};
use domain::common::entity::DscpMarking;
use domain::conn::entity::Connection;

/// Factory producing the standard classifier set for new connections
/// and for reclassification refills.
pub struct StandardClassifierFactory {
    dscp_remark: Option<DscpMarking>,
}

impl StandardClassifierFactory {
    pub fn new(dscp_remark: Option<DscpMarking>) -> Self {
        Self { dscp_remark }
    }
}

impl ClassifierFactory for StandardClassifierFactory {
    fn create(&self, kind: ClassifierKind, conn: &Arc<Connection>) -> Option<Arc<dyn Classifier>> {
        match kind {
            ClassifierKind::Default => {
                Some(Arc::new(DefaultClassifier::new(conn.proto_class())))
            }
            ClassifierKind::Mark => Some(Arc::new(MarkClassifier::new())),
            ClassifierKind::Dscp => Some(Arc::new(DscpClassifier::new(self.dscp_remark))),
            ClassifierKind::Steer => Some(Arc::new(SteerClassifier::new(conn.direction()))),
        }
    }
}
