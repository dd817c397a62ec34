pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use filter::{ClusterFilter, ClusterInstallationFilter, EventsFilter, GroupFilter, InstallationFilter};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::Store;
