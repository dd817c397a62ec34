use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid state transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("dns name '{0}' is already in use")]
    DuplicateDns(String),

    #[error("unrecognized installation size preset '{0}'")]
    UnknownSizePreset(String),

    #[error("resource is locked by another request")]
    ApiLocked,

    #[error("deletion lock prevents this operation")]
    DeletionLocked,

    #[error("invalid annotation name '{0}'")]
    InvalidAnnotation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
