pub mod bus;
pub mod delivery;
pub mod error;

pub use bus::EventBus;
pub use delivery::{run_subscription_worker, run_webhook_worker};
pub use error::EventsError;
