use domain::common::entity::FlowTuple;
use domain::common::error::DomainError;
use domain::conn::entity::ConnSync;
use domain::rule::entity::OffloadRule;

/// Asynchronous acknowledgement from the fast-path engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadResponse {
    Ack,
    Nack,
}

/// Inbound messages from the fast path, delivered on the event channel
/// and consumed by the offload event dispatcher.
#[derive(Debug, Clone)]
pub enum OffloadEvent {
    CreateResponse {
        serial: u32,
        response: OffloadResponse,
    },
    DestroyResponse {
        serial: u32,
        response: OffloadResponse,
    },
    Sync(ConnSync),
}

/// Secondary port to the hardware/firmware offload transport.
///
/// Submits return immediately with accept/reject; the actual outcome
/// arrives later as a `CreateResponse`/`DestroyResponse` carrying the
/// serial that was passed as the completion token. No lock may be held
/// across these calls.
pub trait OffloadPort: Send + Sync {
    fn submit_create(&self, rule: &OffloadRule, serial: u32) -> Result<(), DomainError>;

    fn submit_destroy(&self, tuple: &FlowTuple, serial: u32) -> Result<(), DomainError>;
}
