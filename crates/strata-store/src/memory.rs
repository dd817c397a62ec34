use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use strata_domain::{
    Backup, BackupId, Cluster, ClusterId, ClusterInstallation, ClusterInstallationId,
    DatabaseSchema, DatabaseSchemaId, Event, Group, GroupId, Installation, InstallationId,
    Lease, LogicalDatabase, LogicalDatabaseId, MultitenantDatabase, MultitenantDatabaseId,
    Subscription, SubscriptionId, Webhook, WebhookId,
};

use crate::error::StoreError;
use crate::filter::{ClusterFilter, ClusterInstallationFilter, EventsFilter, GroupFilter, InstallationFilter};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    clusters: HashMap<ClusterId, Cluster>,
    installations: HashMap<InstallationId, Installation>,
    cluster_installations: HashMap<ClusterInstallationId, ClusterInstallation>,
    groups: HashMap<GroupId, Group>,
    multitenant_databases: HashMap<MultitenantDatabaseId, MultitenantDatabase>,
    logical_databases: HashMap<LogicalDatabaseId, LogicalDatabase>,
    database_schemas: HashMap<DatabaseSchemaId, DatabaseSchema>,
    backups: HashMap<BackupId, Backup>,
    webhooks: HashMap<WebhookId, Webhook>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    events: Vec<Event>,
    next_sequence: u64,
}

/// Deterministic, fully synchronous Store backed by `RwLock`-guarded maps.
/// Used by every test in this workspace that doesn't specifically exercise
/// the Postgres backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn try_lock(lock: &mut Lease, holder: &str, now: i64, ttl_nanos: i64) -> bool {
    let expired = lock.is_held() && lock.expires_at <= now;
    if !lock.is_held() || lock.by.as_deref() == Some(holder) || expired {
        lock.by = Some(holder.to_string());
        lock.at = now;
        lock.expires_at = now + ttl_nanos;
        true
    } else {
        false
    }
}

fn try_unlock(lock: &mut Lease, holder: &str, force: bool) -> bool {
    if force || lock.by.as_deref() == Some(holder) {
        *lock = Lease::default();
        true
    } else {
        false
    }
}

macro_rules! lock_methods {
    ($lock_fn:ident, $unlock_fn:ident, $map:ident, $id_ty:ty, $kind:literal) => {
        async fn $lock_fn(&self, id: &$id_ty, holder: &str, ttl_nanos: i64) -> Result<bool, StoreError> {
            let mut inner = self.inner.write().unwrap();
            let now = strata_domain::time::now();
            let rec = inner
                .$map
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound { kind: $kind, id: id.to_string() })?;
            Ok(try_lock(&mut rec.lock, holder, now, ttl_nanos))
        }

        async fn $unlock_fn(&self, id: &$id_ty, holder: &str, force: bool) -> Result<bool, StoreError> {
            let mut inner = self.inner.write().unwrap();
            let rec = inner
                .$map
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound { kind: $kind, id: id.to_string() })?;
            Ok(try_unlock(&mut rec.lock, holder, force))
        }
    };
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_cluster(&self, id: &ClusterId) -> Result<Option<Cluster>, StoreError> {
        Ok(self.inner.read().unwrap().clusters.get(id).cloned())
    }

    async fn get_clusters(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Cluster> = inner
            .clusters
            .values()
            .filter(|c| filter.page.include_deleted || !c.is_deleted())
            .filter(|c| filter.state.map(|s| s.as_str() == c.state.as_str()).unwrap_or(true))
            .filter(|c| c.annotations_match(&filter.annotations))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.create_at, a.id.as_str()).cmp(&(b.create_at, b.id.as_str())));
        Ok(paginate(rows, &filter.page))
    }

    async fn create_cluster(&self, mut cluster: Cluster) -> Result<Cluster, StoreError> {
        let mut inner = self.inner.write().unwrap();
        cluster.create_at = strata_domain::time::now();
        inner.clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(())
    }

    async fn delete_cluster(&self, id: &ClusterId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(c) = inner.clusters.get_mut(id) {
            c.delete_at = now;
        }
        Ok(())
    }

    lock_methods!(lock_cluster, unlock_cluster, clusters, ClusterId, "cluster");

    async fn cluster_api_lock(&self, id: &ClusterId, locked: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let c = inner
            .clusters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { kind: "cluster", id: id.to_string() })?;
        c.api_security_lock = locked;
        Ok(())
    }

    async fn get_installation(&self, id: &InstallationId) -> Result<Option<Installation>, StoreError> {
        Ok(self.inner.read().unwrap().installations.get(id).cloned())
    }

    async fn get_installations(&self, filter: &InstallationFilter) -> Result<Vec<Installation>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Installation> = inner
            .installations
            .values()
            .filter(|i| filter.page.include_deleted || !i.is_deleted())
            .filter(|i| filter.state.map(|s| s.as_str() == i.state.as_str()).unwrap_or(true))
            .filter(|i| filter.owner_id.as_deref().map(|o| o == i.owner_id).unwrap_or(true))
            .filter(|i| filter.dns.as_deref().map(|d| d.eq_ignore_ascii_case(&i.dns)).unwrap_or(true))
            .filter(|i| filter.group_id.as_ref().map(|g| i.group_id.as_ref() == Some(g)).unwrap_or(true))
            .filter(|i| i.annotations_match(&filter.annotations))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.create_at, a.id.as_str()).cmp(&(b.create_at, b.id.as_str())));
        Ok(paginate(rows, &filter.page))
    }

    async fn create_installation(&self, mut installation: Installation) -> Result<Installation, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let dns_taken = inner
            .installations
            .values()
            .any(|i| !i.is_deleted() && i.dns.eq_ignore_ascii_case(&installation.dns));
        if dns_taken {
            return Err(StoreError::DuplicateDns(installation.dns));
        }
        installation.create_at = strata_domain::time::now();
        inner.installations.insert(installation.id.clone(), installation.clone());
        Ok(installation)
    }

    async fn update_installation(&self, installation: &Installation) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.installations.insert(installation.id.clone(), installation.clone());
        Ok(())
    }

    async fn delete_installation(&self, id: &InstallationId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(i) = inner.installations.get_mut(id) {
            i.delete_at = now;
        }
        Ok(())
    }

    lock_methods!(lock_installation, unlock_installation, installations, InstallationId, "installation");

    async fn installation_api_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let i = inner
            .installations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { kind: "installation", id: id.to_string() })?;
        i.api_security_lock = locked;
        Ok(())
    }

    async fn installation_deletion_lock(&self, id: &InstallationId, locked: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let i = inner
            .installations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { kind: "installation", id: id.to_string() })?;
        i.deletion_lock = locked;
        Ok(())
    }

    async fn get_cluster_installation(&self, id: &ClusterInstallationId) -> Result<Option<ClusterInstallation>, StoreError> {
        Ok(self.inner.read().unwrap().cluster_installations.get(id).cloned())
    }

    async fn get_cluster_installations(&self, filter: &ClusterInstallationFilter) -> Result<Vec<ClusterInstallation>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<ClusterInstallation> = inner
            .cluster_installations
            .values()
            .filter(|ci| filter.page.include_deleted || !ci.is_deleted())
            .filter(|ci| filter.state.map(|s| s.as_str() == ci.state.as_str()).unwrap_or(true))
            .filter(|ci| filter.cluster_id.as_ref().map(|c| &ci.cluster_id == c).unwrap_or(true))
            .filter(|ci| filter.installation_id.as_ref().map(|i| &ci.installation_id == i).unwrap_or(true))
            .filter(|ci| filter.is_active.map(|a| ci.is_active == a).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.create_at, a.id.as_str()).cmp(&(b.create_at, b.id.as_str())));
        Ok(paginate(rows, &filter.page))
    }

    async fn create_cluster_installation(&self, mut ci: ClusterInstallation) -> Result<ClusterInstallation, StoreError> {
        let mut inner = self.inner.write().unwrap();
        ci.create_at = strata_domain::time::now();
        inner.cluster_installations.insert(ci.id.clone(), ci.clone());
        Ok(ci)
    }

    async fn update_cluster_installation(&self, ci: &ClusterInstallation) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.cluster_installations.insert(ci.id.clone(), ci.clone());
        Ok(())
    }

    async fn delete_cluster_installation(&self, id: &ClusterInstallationId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(ci) = inner.cluster_installations.get_mut(id) {
            ci.delete_at = now;
        }
        Ok(())
    }

    lock_methods!(lock_cluster_installation, unlock_cluster_installation, cluster_installations, ClusterInstallationId, "cluster_installation");

    async fn cluster_installation_api_lock(&self, id: &ClusterInstallationId, locked: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let ci = inner
            .cluster_installations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { kind: "cluster_installation", id: id.to_string() })?;
        ci.api_security_lock = locked;
        Ok(())
    }

    async fn swap_active_cluster_installation(
        &self,
        deactivate: &ClusterInstallationId,
        activate: &ClusterInstallationId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        {
            let old = inner
                .cluster_installations
                .get_mut(deactivate)
                .ok_or_else(|| StoreError::NotFound { kind: "cluster_installation", id: deactivate.to_string() })?;
            old.is_active = false;
        }
        let new = inner
            .cluster_installations
            .get_mut(activate)
            .ok_or_else(|| StoreError::NotFound { kind: "cluster_installation", id: activate.to_string() })?;
        new.is_active = true;
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.read().unwrap().groups.get(id).cloned())
    }

    async fn get_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Group> = inner
            .groups
            .values()
            .filter(|g| filter.page.include_deleted || !g.is_deleted())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(paginate(rows, &filter.page))
    }

    async fn create_group(&self, group: Group) -> Result<Group, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn update_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: &GroupId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(g) = inner.groups.get_mut(id) {
            g.delete_at = now;
        }
        Ok(())
    }

    lock_methods!(lock_group, unlock_group, groups, GroupId, "group");

    async fn group_api_lock(&self, id: &GroupId, locked: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let g = inner
            .groups
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { kind: "group", id: id.to_string() })?;
        g.api_security_lock = locked;
        Ok(())
    }

    async fn get_multitenant_database(&self, id: &MultitenantDatabaseId) -> Result<Option<MultitenantDatabase>, StoreError> {
        Ok(self.inner.read().unwrap().multitenant_databases.get(id).cloned())
    }

    async fn get_multitenant_databases(&self) -> Result<Vec<MultitenantDatabase>, StoreError> {
        Ok(self.inner.read().unwrap().multitenant_databases.values().cloned().collect())
    }

    async fn create_multitenant_database(&self, db: MultitenantDatabase) -> Result<MultitenantDatabase, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.multitenant_databases.insert(db.id.clone(), db.clone());
        Ok(db)
    }

    async fn delete_multitenant_database(&self, id: &MultitenantDatabaseId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(d) = inner.multitenant_databases.get_mut(id) {
            d.delete_at = now;
        }
        Ok(())
    }

    async fn get_logical_database(&self, id: &LogicalDatabaseId) -> Result<Option<LogicalDatabase>, StoreError> {
        Ok(self.inner.read().unwrap().logical_databases.get(id).cloned())
    }

    async fn get_logical_databases(&self, multitenant_database_id: Option<&MultitenantDatabaseId>) -> Result<Vec<LogicalDatabase>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .logical_databases
            .values()
            .filter(|d| multitenant_database_id.map(|id| &d.multitenant_database_id == id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_logical_database(&self, db: LogicalDatabase) -> Result<LogicalDatabase, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.logical_databases.insert(db.id.clone(), db.clone());
        Ok(db)
    }

    async fn delete_logical_database(&self, id: &LogicalDatabaseId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let has_live_schemas = inner
            .database_schemas
            .values()
            .any(|s| &s.logical_database_id == id && !s.is_deleted());
        if has_live_schemas {
            return Err(StoreError::ReferentialConstraint(
                "logical database has live schemas".into(),
            ));
        }
        if let Some(d) = inner.logical_databases.get_mut(id) {
            d.delete_at = now;
        }
        Ok(())
    }

    async fn get_database_schema(&self, id: &DatabaseSchemaId) -> Result<Option<DatabaseSchema>, StoreError> {
        Ok(self.inner.read().unwrap().database_schemas.get(id).cloned())
    }

    async fn get_database_schemas(&self, logical_database_id: Option<&LogicalDatabaseId>) -> Result<Vec<DatabaseSchema>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .database_schemas
            .values()
            .filter(|s| logical_database_id.map(|id| &s.logical_database_id == id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_database_schema(&self, schema: DatabaseSchema) -> Result<DatabaseSchema, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.database_schemas.insert(schema.id.clone(), schema.clone());
        Ok(schema)
    }

    async fn update_database_schema(&self, schema: &DatabaseSchema) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.database_schemas.insert(schema.id.clone(), schema.clone());
        Ok(())
    }

    async fn delete_database_schema(&self, id: &DatabaseSchemaId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(s) = inner.database_schemas.get_mut(id) {
            s.delete_at = now;
        }
        Ok(())
    }

    lock_methods!(lock_database_schema, unlock_database_schema, database_schemas, DatabaseSchemaId, "database_schema");

    async fn get_backups_for_installation(&self, installation_id: &InstallationId) -> Result<Vec<Backup>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .backups
            .values()
            .filter(|b| &b.installation_id == installation_id)
            .cloned()
            .collect())
    }

    async fn create_backup(&self, backup: Backup) -> Result<Backup, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.backups.insert(backup.id.clone(), backup.clone());
        Ok(backup)
    }

    async fn update_backup(&self, backup: &Backup) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.backups.insert(backup.id.clone(), backup.clone());
        Ok(())
    }

    lock_methods!(lock_backup, unlock_backup, backups, BackupId, "backup");

    async fn get_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, StoreError> {
        Ok(self.inner.read().unwrap().webhooks.get(id).cloned())
    }

    async fn get_webhooks(&self, owner_id: Option<&str>) -> Result<Vec<Webhook>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .webhooks
            .values()
            .filter(|w| w.delete_at == 0)
            .filter(|w| owner_id.map(|o| o == w.owner_id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_webhook(&self, webhook: Webhook) -> Result<Webhook, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.webhooks.insert(webhook.id.clone(), webhook.clone());
        Ok(webhook)
    }

    async fn delete_webhook(&self, id: &WebhookId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(w) = inner.webhooks.get_mut(id) {
            w.delete_at = now;
        }
        Ok(())
    }

    async fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>, StoreError> {
        Ok(self.inner.read().unwrap().subscriptions.get(id).cloned())
    }

    async fn get_subscriptions(&self, owner_id: Option<&str>) -> Result<Vec<Subscription>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .subscriptions
            .values()
            .filter(|s| s.delete_at == 0)
            .filter(|s| owner_id.map(|o| o == s.owner_id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_subscription(&self, subscription: Subscription) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn delete_subscription(&self, id: &SubscriptionId, now: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(s) = inner.subscriptions.get_mut(id) {
            s.delete_at = now;
        }
        Ok(())
    }

    async fn append_event(&self, mut event: Event) -> Result<Event, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.next_sequence += 1;
        event.sequence = inner.next_sequence;
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn get_events(&self, filter: &EventsFilter) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| filter.subject_id.as_deref().map(|s| s == e.subject_id).unwrap_or(true))
            .filter(|e| filter.event_type.as_deref().map(|t| t == e.event_type).unwrap_or(true))
            .filter(|e| filter.after_sequence.map(|seq| e.sequence > seq).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.sequence);
        Ok(paginate(rows, &filter.page))
    }
}

fn paginate<T>(mut rows: Vec<T>, page: &strata_domain::PageRequest) -> Vec<T> {
    if let Some(limit) = page.limit() {
        let offset = page.offset() as usize;
        if offset >= rows.len() {
            return Vec::new();
        }
        rows.drain(..offset);
        rows.truncate(limit as usize);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::{Affinity, CloudProvider, ClusterState, InstallationState};
    use std::collections::HashMap as Map;

    fn dummy_cluster() -> Cluster {
        Cluster {
            id: ClusterId::new(),
            provider: CloudProvider::Aws,
            provisioner: "kops".into(),
            provider_metadata: serde_json::json!({}),
            provisioner_metadata: serde_json::json!({}),
            state: ClusterState::CreationRequested,
            allow_installations: true,
            utility_metadata: serde_json::json!({}),
            annotations: vec![],
            api_security_lock: false,
            create_at: 0,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    fn dummy_installation(dns: &str) -> Installation {
        Installation {
            id: InstallationId::new(),
            owner_id: "owner".into(),
            group_id: None,
            group_sequence: None,
            version: "stable".into(),
            image: "mattermost/mattermost".into(),
            dns: dns.into(),
            dns_records: vec![],
            size: "100users".into(),
            affinity: Affinity::MultiTenant,
            state: InstallationState::CreationRequested,
            database: "aurora-postgres".into(),
            filestore: "bifrost".into(),
            mattermost_env: Map::new(),
            priority_env: Map::new(),
            annotations: vec![],
            cr_version: "v1".into(),
            api_security_lock: false,
            deletion_lock: false,
            create_at: 0,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_cluster() {
        let store = MemoryStore::new();
        let c = store.create_cluster(dummy_cluster()).await.unwrap();
        let fetched = store.get_cluster(&c.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, c.id);
    }

    #[tokio::test]
    async fn duplicate_dns_is_rejected() {
        let store = MemoryStore::new();
        store.create_installation(dummy_installation("a.example.com")).await.unwrap();
        let err = store
            .create_installation(dummy_installation("A.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateDns(_)));
    }

    #[tokio::test]
    async fn lock_conflict_blocks_second_holder() {
        let store = MemoryStore::new();
        let c = store.create_cluster(dummy_cluster()).await.unwrap();
        assert!(store.lock_cluster(&c.id, "replica-a", 30_000_000_000).await.unwrap());
        assert!(!store.lock_cluster(&c.id, "replica-b", 30_000_000_000).await.unwrap());
        assert!(store.unlock_cluster(&c.id, "replica-a", false).await.unwrap());
        assert!(store.lock_cluster(&c.id, "replica-b", 30_000_000_000).await.unwrap());
    }

    #[tokio::test]
    async fn events_are_sequenced() {
        let store = MemoryStore::new();
        let e1 = store
            .append_event(Event {
                id: strata_domain::EventId::new(),
                event_type: "cluster".into(),
                subject_id: "c1".into(),
                old_state: "a".into(),
                new_state: "b".into(),
                timestamp: 1,
                sequence: 0,
                payload: serde_json::json!({}),
            })
            .await
            .unwrap();
        let e2 = store
            .append_event(Event {
                id: strata_domain::EventId::new(),
                event_type: "cluster".into(),
                subject_id: "c1".into(),
                old_state: "b".into(),
                new_state: "c".into(),
                timestamp: 2,
                sequence: 0,
                payload: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert!(e2.sequence > e1.sequence);
    }
}
