use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("delivery error: {0}")]
    Delivery(String),
}
