use std::sync::Mutex;

use tokio::sync::mpsc;

use domain::common::entity::FlowTuple;
use domain::common::error::DomainError;
use domain::conn::entity::ConnSync;
use domain::rule::entity::OffloadRule;
use ports::secondary::offload_port::{OffloadEvent, OffloadPort, OffloadResponse};

/// How the simulated fast path answers submits. Defaults to accepting
/// and acking everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportBehavior {
    /// Reject the submit call itself (immediate driver failure).
    pub reject_create: bool,
    pub reject_destroy: bool,
    /// Accept the submit but nack the asynchronous acknowledgement.
    pub nack_create: bool,
    pub nack_destroy: bool,
}

/// Channel-backed offload transport.
///
/// Models the hardware contract: submits return immediately with
/// accept/reject, and the actual outcome arrives later on the event
/// channel keyed by the completion token. Used by the loopback
/// deployment (no fast-path engine present) and by tests, which can
/// also inject stats-sync messages with `emit_sync`.
pub struct ChannelOffloadTransport {
    tx: mpsc::Sender<OffloadEvent>,
    behavior: Mutex<TransportBehavior>,
    submitted_creates: Mutex<Vec<OffloadRule>>,
    submitted_destroys: Mutex<Vec<FlowTuple>>,
}

impl ChannelOffloadTransport {
    pub fn new(tx: mpsc::Sender<OffloadEvent>) -> Self {
        Self {
            tx,
            behavior: Mutex::new(TransportBehavior::default()),
            submitted_creates: Mutex::new(Vec::new()),
            submitted_destroys: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: TransportBehavior) {
        *self.behavior.lock().expect("behavior lock poisoned") = behavior;
    }

    /// Inject a periodic stats-sync message, as the engine would.
    pub fn emit_sync(&self, sync: ConnSync) {
        self.send(OffloadEvent::Sync(sync));
    }

    pub fn submitted_creates(&self) -> Vec<OffloadRule> {
        self.submitted_creates
            .lock()
            .expect("creates lock poisoned")
            .clone()
    }

    pub fn submitted_destroys(&self) -> Vec<FlowTuple> {
        self.submitted_destroys
            .lock()
            .expect("destroys lock poisoned")
            .clone()
    }

    fn send(&self, event: OffloadEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("offload event channel full, event dropped");
        }
    }
}

impl OffloadPort for ChannelOffloadTransport {
    fn submit_create(&self, rule: &OffloadRule, serial: u32) -> Result<(), DomainError> {
        let behavior = *self.behavior.lock().expect("behavior lock poisoned");
        if behavior.reject_create {
            return Err(DomainError::Transport("create queue full".into()));
        }
        self.submitted_creates
            .lock()
            .expect("creates lock poisoned")
            .push(rule.clone());

        let response = if behavior.nack_create {
            OffloadResponse::Nack
        } else {
            OffloadResponse::Ack
        };
        self.send(OffloadEvent::CreateResponse { serial, response });
        Ok(())
    }

    fn submit_destroy(&self, tuple: &FlowTuple, serial: u32) -> Result<(), DomainError> {
        let behavior = *self.behavior.lock().expect("behavior lock poisoned");
        if behavior.reject_destroy {
            return Err(DomainError::Transport("destroy queue full".into()));
        }
        self.submitted_destroys
            .lock()
            .expect("destroys lock poisoned")
            .push(*tuple);

        let response = if behavior.nack_destroy {
            OffloadResponse::Nack
        } else {
            OffloadResponse::Ack
        };
        self.send(OffloadEvent::DestroyResponse { serial, response });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::PROTO_UDP;

    fn tuple() -> FlowTuple {
        FlowTuple::new(
            "2001:db8::1".parse().unwrap(),
            "2001:db8::2".parse().unwrap(),
            PROTO_UDP,
            1000,
            2000,
        )
    }

    #[test]
    fn rejected_create_is_an_error_and_queues_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = ChannelOffloadTransport::new(tx);
        transport.set_behavior(TransportBehavior {
            reject_destroy: true,
            ..TransportBehavior::default()
        });
        assert!(transport.submit_destroy(&tuple(), 7).is_err());
        assert!(rx.try_recv().is_err());
        assert!(transport.submitted_destroys().is_empty());
    }

    #[test]
    fn accepted_destroy_queues_response() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = ChannelOffloadTransport::new(tx);
        transport.submit_destroy(&tuple(), 7).unwrap();
        match rx.try_recv().unwrap() {
            OffloadEvent::DestroyResponse { serial, response } => {
                assert_eq!(serial, 7);
                assert_eq!(response, OffloadResponse::Ack);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(transport.submitted_destroys().len(), 1);
    }

    #[test]
    fn nack_behavior_flips_response() {
        let (tx, mut rx) = mpsc::channel(4);
        let transport = ChannelOffloadTransport::new(tx);
        transport.set_behavior(TransportBehavior {
            nack_destroy: true,
            ..TransportBehavior::default()
        });
        transport.submit_destroy(&tuple(), 9).unwrap();
        match rx.try_recv().unwrap() {
            OffloadEvent::DestroyResponse { response, .. } => {
                assert_eq!(response, OffloadResponse::Nack);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
