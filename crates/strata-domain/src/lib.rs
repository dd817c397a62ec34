pub mod error;
pub mod id;
pub mod states;
pub mod time;
pub mod types;

pub use error::DomainError;
pub use id::{
    AnnotationId, BackupId, ClusterId, ClusterInstallationId, DatabaseSchemaId, EventId,
    GroupId, InstallationId, LogicalDatabaseId, MultitenantDatabaseId, SubscriptionId,
    WebhookId,
};
pub use states::{ClusterInstallationState, ClusterState, InstallationState, WorkState};
pub use time::Timestamp;
pub use types::{
    Affinity, Backup, CloudProvider, Cluster, ClusterInstallation, DatabaseSchema,
    DatabaseType, DeliveryStatus, Event, Group, GroupStatus, Lease, LogicalDatabase,
    MultitenantDatabase, PageRequest, Scheduling, Subscription, Webhook, SIZE_PRESETS,
};
