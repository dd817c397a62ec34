use async_trait::async_trait;
use strata_domain::{
    Backup, BackupId, Cluster, ClusterId, ClusterInstallation, ClusterInstallationId,
    DatabaseSchema, DatabaseSchemaId, Event, Group, GroupId, Installation, InstallationId,
    LogicalDatabase, LogicalDatabaseId, MultitenantDatabase, MultitenantDatabaseId,
    Subscription, SubscriptionId, Webhook, WebhookId,
};

use crate::error::StoreError;
use crate::filter::{ClusterFilter, ClusterInstallationFilter, EventsFilter, GroupFilter, InstallationFilter};

/// Transactional persistence for every resource, with per-row distributed
/// leases. `Get{Kind}` never errors for absence — it returns `Ok(None)`.
/// `Lock{Kind}`/`Unlock{Kind}` are the cross-process mutual-exclusion
/// primitive every supervisor relies on; no in-process lock may substitute
/// for them because multiple replicas of this process run concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Cluster --------------------------------------------------------
    async fn get_cluster(&self, id: &ClusterId) -> Result<Option<Cluster>, StoreError>;
    async fn get_clusters(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, StoreError>;
    async fn create_cluster(&self, cluster: Cluster) -> Result<Cluster, StoreError>;
    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), StoreError>;
    async fn delete_cluster(&self, id: &ClusterId, now: i64) -> Result<(), StoreError>;
    async fn lock_cluster(&self, id: &ClusterId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_cluster(&self, id: &ClusterId, holder: &str, force: bool) -> Result<bool, StoreError>;
    async fn cluster_api_lock(&self, id: &ClusterId, locked: bool) -> Result<(), StoreError>;

    // -- Installation -----------------------------------------------------
    async fn get_installation(&self, id: &InstallationId) -> Result<Option<Installation>, StoreError>;
    async fn get_installations(&self, filter: &InstallationFilter) -> Result<Vec<Installation>, StoreError>;
    async fn create_installation(&self, installation: Installation) -> Result<Installation, StoreError>;
    async fn update_installation(&self, installation: &Installation) -> Result<(), StoreError>;
    async fn delete_installation(&self, id: &InstallationId, now: i64) -> Result<(), StoreError>;
    async fn lock_installation(&self, id: &InstallationId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_installation(&self, id: &InstallationId, holder: &str, force: bool) -> Result<bool, StoreError>;
    async fn installation_api_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError>;
    async fn installation_deletion_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError>;

    // -- ClusterInstallation ----------------------------------------------
    async fn get_cluster_installation(&self, id: &ClusterInstallationId) -> Result<Option<ClusterInstallation>, StoreError>;
    async fn get_cluster_installations(&self, filter: &ClusterInstallationFilter) -> Result<Vec<ClusterInstallation>, StoreError>;
    async fn create_cluster_installation(&self, ci: ClusterInstallation) -> Result<ClusterInstallation, StoreError>;
    async fn update_cluster_installation(&self, ci: &ClusterInstallation) -> Result<(), StoreError>;
    async fn delete_cluster_installation(&self, id: &ClusterInstallationId, now: i64) -> Result<(), StoreError>;
    async fn lock_cluster_installation(&self, id: &ClusterInstallationId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_cluster_installation(&self, id: &ClusterInstallationId, holder: &str, force: bool) -> Result<bool, StoreError>;
    async fn cluster_installation_api_lock(&self, id: &ClusterInstallationId, locked: bool) -> Result<(), StoreError>;

    /// Atomically flips `isActive` between two ClusterInstallations during a
    /// DNS switch — both rows change in a single transaction or neither does.
    async fn swap_active_cluster_installation(
        &self,
        deactivate: &ClusterInstallationId,
        activate: &ClusterInstallationId,
    ) -> Result<(), StoreError>;

    // -- Group --------------------------------------------------------------
    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError>;
    async fn get_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError>;
    async fn create_group(&self, group: Group) -> Result<Group, StoreError>;
    async fn update_group(&self, group: &Group) -> Result<(), StoreError>;
    async fn delete_group(&self, id: &GroupId, now: i64) -> Result<(), StoreError>;
    async fn lock_group(&self, id: &GroupId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_group(&self, id: &GroupId, holder: &str, force: bool) -> Result<bool, StoreError>;
    async fn group_api_lock(&self, id: &GroupId, locked: bool) -> Result<(), StoreError>;

    // -- Database hierarchy ---------------------------------------------
    async fn get_multitenant_database(&self, id: &MultitenantDatabaseId) -> Result<Option<MultitenantDatabase>, StoreError>;
    async fn get_multitenant_databases(&self) -> Result<Vec<MultitenantDatabase>, StoreError>;
    async fn create_multitenant_database(&self, db: MultitenantDatabase) -> Result<MultitenantDatabase, StoreError>;
    async fn delete_multitenant_database(&self, id: &MultitenantDatabaseId, now: i64) -> Result<(), StoreError>;

    async fn get_logical_database(&self, id: &LogicalDatabaseId) -> Result<Option<LogicalDatabase>, StoreError>;
    async fn get_logical_databases(&self, multitenant_database_id: Option<&MultitenantDatabaseId>) -> Result<Vec<LogicalDatabase>, StoreError>;
    async fn create_logical_database(&self, db: LogicalDatabase) -> Result<LogicalDatabase, StoreError>;
    async fn delete_logical_database(&self, id: &LogicalDatabaseId, now: i64) -> Result<(), StoreError>;

    async fn get_database_schema(&self, id: &DatabaseSchemaId) -> Result<Option<DatabaseSchema>, StoreError>;
    async fn get_database_schemas(&self, logical_database_id: Option<&LogicalDatabaseId>) -> Result<Vec<DatabaseSchema>, StoreError>;
    async fn create_database_schema(&self, schema: DatabaseSchema) -> Result<DatabaseSchema, StoreError>;
    async fn update_database_schema(&self, schema: &DatabaseSchema) -> Result<(), StoreError>;
    async fn delete_database_schema(&self, id: &DatabaseSchemaId, now: i64) -> Result<(), StoreError>;
    async fn lock_database_schema(&self, id: &DatabaseSchemaId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_database_schema(&self, id: &DatabaseSchemaId, holder: &str, force: bool) -> Result<bool, StoreError>;

    // -- Backup -------------------------------------------------------------
    async fn get_backups_for_installation(&self, installation_id: &InstallationId) -> Result<Vec<Backup>, StoreError>;
    async fn create_backup(&self, backup: Backup) -> Result<Backup, StoreError>;
    async fn update_backup(&self, backup: &Backup) -> Result<(), StoreError>;
    async fn lock_backup(&self, id: &BackupId, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError>;
    async fn unlock_backup(&self, id: &BackupId, holder: &str, force: bool) -> Result<bool, StoreError>;

    // -- Webhooks / Subscriptions / Events --------------------------------
    async fn get_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, StoreError>;
    async fn get_webhooks(&self, owner_id: Option<&str>) -> Result<Vec<Webhook>, StoreError>;
    async fn create_webhook(&self, webhook: Webhook) -> Result<Webhook, StoreError>;
    async fn delete_webhook(&self, id: &WebhookId, now: i64) -> Result<(), StoreError>;

    async fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>, StoreError>;
    async fn get_subscriptions(&self, owner_id: Option<&str>) -> Result<Vec<Subscription>, StoreError>;
    async fn create_subscription(&self, subscription: Subscription) -> Result<Subscription, StoreError>;
    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;
    async fn delete_subscription(&self, id: &SubscriptionId, now: i64) -> Result<(), StoreError>;

    async fn append_event(&self, event: Event) -> Result<Event, StoreError>;
    async fn get_events(&self, filter: &EventsFilter) -> Result<Vec<Event>, StoreError>;
}
