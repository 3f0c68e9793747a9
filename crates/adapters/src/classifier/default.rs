use std::sync::atomic::{AtomicBool, Ordering};

use domain::classifier::entity::{ClassifierKind, ClassifierResponse, Relevance};
use domain::classifier::plugin::Classifier;
use domain::common::entity::{PacketView, ProtoClass, Sender, TimerGroup};

/// The permanent slot-0 classifier: always relevant, never unassigned.
/// Its only policy is the idle-timeout group, which it tightens or
/// relaxes as the connection proves itself bidirectional.
pub struct DefaultClassifier {
    class: ProtoClass,
    seen_src: AtomicBool,
    seen_dest: AtomicBool,
}

impl DefaultClassifier {
    pub fn new(class: ProtoClass) -> Self {
        Self {
            class,
            seen_src: AtomicBool::new(false),
            seen_dest: AtomicBool::new(false),
        }
    }

    fn bidirectional(&self) -> bool {
        self.seen_src.load(Ordering::Relaxed) && self.seen_dest.load(Ordering::Relaxed)
    }
}

impl Classifier for DefaultClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Default
    }

    fn process(&self, sender: Sender, _packet: &PacketView) -> ClassifierResponse {
        match sender {
            Sender::Src => self.seen_src.store(true, Ordering::Relaxed),
            Sender::Dest => self.seen_dest.store(true, Ordering::Relaxed),
        }

        let timer_group = match self.class {
            ProtoClass::Tcp => {
                if self.bidirectional() {
                    TimerGroup::TcpEstablished
                } else {
                    TimerGroup::TcpTransient
                }
            }
            ProtoClass::Udp => TimerGroup::Udp,
            ProtoClass::NonPorted => TimerGroup::Generic,
        };

        ClassifierResponse {
            timer_group: Some(timer_group),
            ..ClassifierResponse::relevant(Relevance::Yes)
        }
    }
}
