use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no driver registered for provisioner '{0}'")]
    NotConfigured(String),

    /// Transient infra failure — the supervisor stays in the same pending
    /// state and the next tick retries.
    #[error("transient driver failure: {0}")]
    Retriable(String),

    /// Non-retriable — the supervisor moves the resource to its `*-failed`
    /// state; a client must explicitly re-request the verb to recover.
    #[error("permanent driver failure: {0}")]
    Permanent(String),

    #[error("internal driver error: {0}")]
    Internal(String),
}
