use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("store error: {0}")]
    Store(String),

    #[error("offload transport rejected submit: {0}")]
    Transport(String),

    #[error("invalid value: {0}")]
    Invalid(String),
}
