use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("driver error: {0}")]
    Driver(#[from] strata_driver::DriverError),

    #[error("events error: {0}")]
    Events(#[from] strata_events::EventsError),

    #[error("scheduling error: {0}")]
    Scheduling(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("internal supervisor error: {0}")]
    Internal(String),
}
