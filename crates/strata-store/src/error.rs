use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("dns name '{0}' is already in use")]
    DuplicateDns(String),

    #[error("lease held by '{holder}'")]
    LockConflict { holder: String },

    #[error("referential constraint violated: {0}")]
    ReferentialConstraint(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
