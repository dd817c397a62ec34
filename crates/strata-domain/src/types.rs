use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::{
    BackupId, ClusterId, ClusterInstallationId, DatabaseSchemaId, EventId, GroupId,
    InstallationId, LogicalDatabaseId, MultitenantDatabaseId, SubscriptionId, WebhookId,
};
use crate::states::{ClusterInstallationState, ClusterState, InstallationState, WorkState};
use crate::time::Timestamp;

/// A short-term row-scoped claim permitting mutation of exactly one resource.
/// `by` is the requester identity (a supervisor replica ID); `at` is when it
/// was acquired. There is at most one live lease per resource ID — the Store
/// enforces this, not this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Lease {
    pub by: Option<String>,
    pub at: Timestamp,
    pub expires_at: Timestamp,
}

impl Lease {
    pub fn is_held(&self) -> bool {
        self.by.is_some()
    }
}

pub type Annotations = Vec<String>;

fn annotations_are_subset(required: &[String], present: &[String]) -> bool {
    required.iter().all(|r| present.contains(r))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub provider: CloudProvider,
    pub provisioner: String,
    pub provider_metadata: serde_json::Value,
    pub provisioner_metadata: serde_json::Value,
    pub state: ClusterState,
    pub allow_installations: bool,
    pub utility_metadata: serde_json::Value,
    pub annotations: Annotations,
    pub api_security_lock: bool,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl Cluster {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }

    /// Required by every scheduling and migration rule in §4.4/§4.6: a
    /// cluster can only become a migration source once it stops accepting
    /// new placements.
    pub fn can_become_migration_source(&self) -> bool {
        !self.allow_installations
    }

    pub fn annotations_match(&self, required: &[String]) -> bool {
        annotations_are_subset(required, &self.annotations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Affinity {
    Isolated,
    MultiTenant,
}

pub const SIZE_PRESETS: &[&str] = &["100users", "1000users", "5000users", "10000users"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub id: InstallationId,
    pub owner_id: String,
    pub group_id: Option<GroupId>,
    pub group_sequence: Option<u64>,
    pub version: String,
    pub image: String,
    pub dns: String,
    pub dns_records: Vec<String>,
    pub size: String,
    pub affinity: Affinity,
    pub state: InstallationState,
    pub database: String,
    pub filestore: String,
    pub mattermost_env: HashMap<String, String>,
    pub priority_env: HashMap<String, String>,
    pub annotations: Annotations,
    pub cr_version: String,
    pub api_security_lock: bool,
    pub deletion_lock: bool,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl Installation {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }

    pub fn is_stale_against(&self, group_sequence: u64) -> bool {
        match self.group_sequence {
            Some(seq) => seq < group_sequence,
            None => false,
        }
    }

    /// Environment merge in decreasing priority: priorityEnv > group env (if
    /// requested) > mattermostEnv. Mirrors §4.2's merge rule exactly.
    pub fn merged_env(
        &self,
        group_env: Option<&HashMap<String, String>>,
        include_group_config: bool,
        include_group_config_overrides: bool,
    ) -> HashMap<String, String> {
        if !(include_group_config && include_group_config_overrides) {
            return self.mattermost_env.clone();
        }
        let mut merged = self.mattermost_env.clone();
        if let Some(group_env) = group_env {
            for (k, v) in group_env {
                merged.insert(k.clone(), v.clone());
            }
        }
        for (k, v) in &self.priority_env {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn annotations_match(&self, required: &[String]) -> bool {
        annotations_are_subset(required, &self.annotations)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInstallation {
    pub id: ClusterInstallationId,
    pub cluster_id: ClusterId,
    pub installation_id: InstallationId,
    pub namespace: String,
    pub state: ClusterInstallationState,
    pub is_active: bool,
    pub api_security_lock: bool,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl ClusterInstallation {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduling {
    pub priority_env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub version: String,
    pub image: String,
    pub mattermost_env: HashMap<String, String>,
    pub max_rolling: u32,
    pub scheduling: Scheduling,
    pub annotations: Annotations,
    pub sequence: u64,
    pub api_security_lock: bool,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl Group {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupStatus {
    pub total: u64,
    pub rolling: u64,
    pub stale: u64,
    pub up_to_date: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseType {
    AuroraPostgres,
    AuroraMysql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultitenantDatabase {
    pub id: MultitenantDatabaseId,
    pub cluster_id: ClusterId,
    pub database_type: DatabaseType,
    pub max_installations_per_logical_database: u32,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
}

impl MultitenantDatabase {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalDatabase {
    pub id: LogicalDatabaseId,
    pub multitenant_database_id: MultitenantDatabaseId,
    pub name: String,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
}

impl LogicalDatabase {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub id: DatabaseSchemaId,
    pub logical_database_id: LogicalDatabaseId,
    pub installation_id: InstallationId,
    pub name: String,
    pub state: WorkState,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl DatabaseSchema {
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub installation_id: InstallationId,
    pub state: WorkState,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
    pub lock: Lease,
}

impl Backup {
    pub fn is_running(&self) -> bool {
        self.state.is_pending()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub owner_id: String,
    pub url: String,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner_id: String,
    pub url: String,
    pub event_type: String,
    pub last_delivery_status: DeliveryStatus,
    pub last_delivery_attempt: Timestamp,
    pub attempt_count: u32,
    pub create_at: Timestamp,
    pub delete_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    pub subject_id: String,
    pub old_state: String,
    pub new_state: String,
    pub timestamp: Timestamp,
    pub sequence: u64,
    pub payload: serde_json::Value,
}

/// Uniform paging contract shared by every `Get{Kind}s` listing call.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: i32,
    pub include_deleted: bool,
}

impl PageRequest {
    pub fn all() -> Self {
        Self {
            page: 0,
            per_page: -1,
            include_deleted: false,
        }
    }

    pub fn limit(&self) -> Option<i64> {
        if self.per_page < 0 {
            None
        } else {
            Some(self.per_page as i64)
        }
    }

    pub fn offset(&self) -> i64 {
        match self.limit() {
            Some(limit) => limit * self.page as i64,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_case_variants_compare_unequal_by_default() {
        // Uniqueness enforcement lives in the Store (case-insensitively);
        // the domain type itself is just a plain string.
        assert_ne!("Foo.example".to_string(), "foo.example".to_string());
    }

    #[test]
    fn page_request_all_has_no_limit() {
        assert_eq!(PageRequest::all().limit(), None);
    }

    #[test]
    fn annotations_subset_matches() {
        let present = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(annotations_are_subset(&["a".to_string(), "b".to_string()], &present));
        assert!(!annotations_are_subset(&["z".to_string()], &present));
    }
}
