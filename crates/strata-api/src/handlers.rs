use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use strata_domain::{
    Affinity, Backup, BackupId, Cluster, ClusterId, ClusterInstallation, ClusterInstallationId, CloudProvider,
    DatabaseSchema, DatabaseSchemaId, Group, GroupId, Installation, InstallationId, LogicalDatabase,
    LogicalDatabaseId, MultitenantDatabase, MultitenantDatabaseId, PageRequest, Scheduling, Subscription,
    SubscriptionId, Webhook, WebhookId, WorkState,
};
use strata_store::{ClusterFilter, ClusterInstallationFilter, EventsFilter, GroupFilter, InstallationFilter, StoreError};

use crate::error::ApiError;
use crate::state::AppState;

/// Lease duration a handler holds while it reads-modifies-writes a resource.
/// Long enough to cover a store round trip, short enough that a crashed
/// request doesn't wedge the resource for long.
const API_LOCK_TTL_NANOS: i64 = 30_000_000_000;

/// A fresh per-request lease holder. Reusing `ClusterId::new()` as a bare
/// random-token generator mirrors `SupervisorConfig::replica_id`'s own use
/// of an unrelated ID type for the same purpose.
fn lock_holder() -> String {
    format!("api-{}", ClusterId::new().as_str())
}

async fn lock_cluster_or_conflict(state: &AppState, id: &ClusterId, holder: &str) -> Result<(), ApiError> {
    if !state.store.lock_cluster(id, holder, API_LOCK_TTL_NANOS).await? {
        return Err(StoreError::LockConflict { holder: "unknown".to_string() }.into());
    }
    Ok(())
}

async fn lock_installation_or_conflict(state: &AppState, id: &InstallationId, holder: &str) -> Result<(), ApiError> {
    if !state.store.lock_installation(id, holder, API_LOCK_TTL_NANOS).await? {
        return Err(StoreError::LockConflict { holder: "unknown".to_string() }.into());
    }
    Ok(())
}

async fn lock_group_or_conflict(state: &AppState, id: &GroupId, holder: &str) -> Result<(), ApiError> {
    if !state.store.lock_group(id, holder, API_LOCK_TTL_NANOS).await? {
        return Err(StoreError::LockConflict { holder: "unknown".to_string() }.into());
    }
    Ok(())
}

// ── Health ───────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.get_clusters(&ClusterFilter::default()).await?;
    Ok(StatusCode::OK)
}

// ── Paging -------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<i32>,
    pub include_deleted: Option<bool>,
}

impl PageQuery {
    fn into_page(self) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(0),
            per_page: self.per_page.unwrap_or(100),
            include_deleted: self.include_deleted.unwrap_or(false),
        }
    }
}

// ── Clusters -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateClusterRequest {
    pub provider: CloudProvider,
    pub provisioner: String,
    #[serde(default)]
    pub annotations: Vec<String>,
}

pub async fn list_clusters(State(state): State<AppState>, Query(q): Query<PageQuery>) -> Result<Json<Value>, ApiError> {
    let clusters = state.store.get_clusters(&ClusterFilter { page: q.into_page(), ..Default::default() }).await?;
    Ok(Json(json!(clusters)))
}

pub async fn create_cluster(State(state): State<AppState>, Json(body): Json<CreateClusterRequest>) -> Result<impl IntoResponse, ApiError> {
    let cluster = Cluster {
        id: ClusterId::new(),
        provider: body.provider,
        provisioner: body.provisioner,
        provider_metadata: json!({}),
        provisioner_metadata: json!({}),
        state: strata_domain::ClusterState::CreationRequested,
        allow_installations: true,
        utility_metadata: json!({}),
        annotations: body.annotations,
        api_security_lock: false,
        create_at: strata_domain::time::now(),
        delete_at: 0,
        lock: Default::default(),
    };
    let created = state.store.create_cluster(cluster).await?;
    state.nudges.cluster.post();
    Ok((StatusCode::ACCEPTED, Json(json!(created))))
}

pub async fn get_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let cluster = state
        .store
        .get_cluster(&ClusterId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cluster '{id}' not found")))?;
    Ok(Json(json!(cluster)))
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchClusterRequest {
    pub allow_installations: Option<bool>,
    pub annotations: Option<Vec<String>>,
}

pub async fn update_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchClusterRequest>,
) -> Result<Json<Value>, ApiError> {
    let cluster = require_cluster(&state, &id).await?;
    reject_if_api_locked(cluster.api_security_lock)?;
    let cluster_id = cluster.id.clone();
    let holder = lock_holder();
    lock_cluster_or_conflict(&state, &cluster_id, &holder).await?;
    let result = async {
        let mut cluster = cluster;
        if let Some(allow) = body.allow_installations {
            cluster.allow_installations = allow;
        }
        if let Some(annotations) = body.annotations {
            cluster.annotations = annotations;
        }
        state.store.update_cluster(&cluster).await?;
        Ok::<_, ApiError>(cluster)
    }
    .await;
    state.store.unlock_cluster(&cluster_id, &holder, false).await?;
    result.map(|cluster| Json(json!(cluster)))
}

pub async fn delete_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let cluster = require_cluster(&state, &id).await?;
    reject_if_api_locked(cluster.api_security_lock)?;
    let cluster_id = cluster.id.clone();
    let holder = lock_holder();
    lock_cluster_or_conflict(&state, &cluster_id, &holder).await?;
    let result = async {
        let mut cluster = cluster;
        if !cluster.state.can_transition(strata_domain::ClusterState::DeletionRequested) {
            return Err(ApiError::bad_request(format!("cannot delete cluster in state '{}'", cluster.state)));
        }
        cluster.state = strata_domain::ClusterState::DeletionRequested;
        state.store.update_cluster(&cluster).await?;
        state.nudges.cluster.post();
        Ok::<_, ApiError>(cluster)
    }
    .await;
    state.store.unlock_cluster(&cluster_id, &holder, false).await?;
    result.map(|cluster| (StatusCode::ACCEPTED, Json(json!(cluster))))
}

/// Retries a failed creation. Idempotent: calling this again on an
/// already-pending cluster is a no-op that returns the current record.
pub async fn retry_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let cluster = require_cluster(&state, &id).await?;
    reject_if_api_locked(cluster.api_security_lock)?;
    if cluster.state.is_pending() {
        return Ok((StatusCode::ACCEPTED, Json(json!(cluster))));
    }
    let cluster_id = cluster.id.clone();
    let holder = lock_holder();
    lock_cluster_or_conflict(&state, &cluster_id, &holder).await?;
    let result = async {
        let mut cluster = cluster;
        if cluster.state.is_pending() {
            return Ok::<_, ApiError>(cluster);
        }
        if !cluster.state.can_transition(strata_domain::ClusterState::CreationRequested) {
            return Err(ApiError::bad_request(format!("cannot retry cluster in state '{}'", cluster.state)));
        }
        cluster.state = strata_domain::ClusterState::CreationRequested;
        state.store.update_cluster(&cluster).await?;
        state.nudges.cluster.post();
        Ok(cluster)
    }
    .await;
    state.store.unlock_cluster(&cluster_id, &holder, false).await?;
    result.map(|cluster| (StatusCode::ACCEPTED, Json(json!(cluster))))
}

pub async fn provision_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    transition_cluster(&state, &id, strata_domain::ClusterState::ProvisioningRequested).await
}

pub async fn upgrade_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    transition_cluster(&state, &id, strata_domain::ClusterState::UpgradeRequested).await
}

pub async fn resize_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    transition_cluster(&state, &id, strata_domain::ClusterState::ResizeRequested).await
}

async fn transition_cluster(
    state: &AppState,
    id: &str,
    to: strata_domain::ClusterState,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = require_cluster(state, id).await?;
    reject_if_api_locked(cluster.api_security_lock)?;
    let cluster_id = cluster.id.clone();
    let holder = lock_holder();
    lock_cluster_or_conflict(state, &cluster_id, &holder).await?;
    let result = async {
        let mut cluster = cluster;
        if !cluster.state.can_transition(to) {
            return Err(ApiError::bad_request(format!("cannot move cluster from '{}' to '{}'", cluster.state, to)));
        }
        cluster.state = to;
        state.store.update_cluster(&cluster).await?;
        state.nudges.cluster.post();
        Ok::<_, ApiError>(cluster)
    }
    .await;
    state.store.unlock_cluster(&cluster_id, &holder, false).await?;
    result.map(|cluster| (StatusCode::ACCEPTED, Json(json!(cluster))))
}

async fn require_cluster(state: &AppState, id: &str) -> Result<Cluster, ApiError> {
    state
        .store
        .get_cluster(&ClusterId::from(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cluster '{id}' not found")))
}

fn reject_if_api_locked(locked: bool) -> Result<(), ApiError> {
    if locked {
        Err(ApiError::forbidden("resource is API-security-locked"))
    } else {
        Ok(())
    }
}

// ── Installations ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateInstallationRequest {
    pub owner_id: String,
    pub dns: String,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
}

pub async fn list_installations(State(state): State<AppState>, Query(q): Query<PageQuery>) -> Result<Json<Value>, ApiError> {
    let installations = state.store.get_installations(&InstallationFilter { page: q.into_page(), ..Default::default() }).await?;
    Ok(Json(json!(installations)))
}

pub async fn create_installation(
    State(state): State<AppState>,
    Json(body): Json<CreateInstallationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .store
        .get_installations(&InstallationFilter { dns: Some(body.dns.clone()), ..Default::default() })
        .await?;
    if existing.iter().any(|i| !i.is_deleted()) {
        return Err(ApiError::bad_request(format!("dns '{}' is already in use", body.dns)));
    }

    let size = body.size.unwrap_or_else(|| strata_domain::SIZE_PRESETS[0].to_string());
    if !strata_domain::SIZE_PRESETS.contains(&size.as_str()) {
        return Err(ApiError::bad_request(format!("unrecognized size preset '{size}'")));
    }

    let installation = Installation {
        id: InstallationId::new(),
        owner_id: body.owner_id,
        group_id: None,
        group_sequence: None,
        version: "stable".into(),
        image: "mattermost/mattermost".into(),
        dns: body.dns,
        dns_records: vec![],
        size,
        affinity: body.affinity.unwrap_or(Affinity::MultiTenant),
        state: strata_domain::InstallationState::CreationRequested,
        database: "aurora-postgres".into(),
        filestore: "bifrost".into(),
        mattermost_env: HashMap::new(),
        priority_env: HashMap::new(),
        annotations: body.annotations,
        cr_version: "v1".into(),
        api_security_lock: false,
        deletion_lock: false,
        create_at: strata_domain::time::now(),
        delete_at: 0,
        lock: Default::default(),
    };
    let created = state.store.create_installation(installation).await?;
    state.nudges.installation.post();
    Ok((StatusCode::ACCEPTED, Json(json!(created))))
}

pub async fn get_installation(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(require_installation(&state, &id).await?)))
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchInstallationRequest {
    pub mattermost_env: Option<HashMap<String, String>>,
    pub image: Option<String>,
    pub version: Option<String>,
}

pub async fn update_installation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchInstallationRequest>,
) -> Result<Json<Value>, ApiError> {
    let installation = require_installation(&state, &id).await?;
    reject_if_api_locked(installation.api_security_lock)?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        let mut changed = false;
        if let Some(env) = body.mattermost_env {
            installation.mattermost_env = env;
            changed = true;
        }
        if let Some(image) = body.image {
            installation.image = image;
            changed = true;
        }
        if let Some(version) = body.version {
            installation.version = version;
            changed = true;
        }
        if changed && installation.state == strata_domain::InstallationState::Stable {
            installation.state = strata_domain::InstallationState::UpdateRequested;
            state.nudges.installation.post();
        }
        state.store.update_installation(&installation).await?;
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

pub async fn delete_installation(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let installation = require_installation(&state, &id).await?;
    reject_if_api_locked(installation.api_security_lock)?;
    if installation.deletion_lock {
        return Err(ApiError::forbidden("deletion lock prevents this operation"));
    }
    let running_backups = state
        .store
        .get_backups_for_installation(&installation.id)
        .await?
        .into_iter()
        .any(|b| b.is_running());
    if running_backups {
        return Err(ApiError::conflict("installation has a running backup"));
    }
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        if !installation.state.can_transition(strata_domain::InstallationState::DeletionRequested) {
            return Err(ApiError::bad_request(format!("cannot delete installation in state '{}'", installation.state)));
        }
        installation.state = strata_domain::InstallationState::DeletionRequested;
        state.store.update_installation(&installation).await?;
        state.nudges.installation.post();
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| (StatusCode::ACCEPTED, Json(json!(installation))))
}

pub async fn hibernate_installation(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    transition_installation(&state, &id, strata_domain::InstallationState::HibernationRequested).await
}

pub async fn wakeup_installation(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    transition_installation(&state, &id, strata_domain::InstallationState::WakeupRequested).await
}

async fn transition_installation(
    state: &AppState,
    id: &str,
    to: strata_domain::InstallationState,
) -> Result<impl IntoResponse, ApiError> {
    let installation = require_installation(state, id).await?;
    reject_if_api_locked(installation.api_security_lock)?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        if !installation.state.can_transition(to) {
            return Err(ApiError::bad_request(format!("cannot move installation from '{}' to '{}'", installation.state, to)));
        }
        installation.state = to;
        state.store.update_installation(&installation).await?;
        state.nudges.installation.post();
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| (StatusCode::ACCEPTED, Json(json!(installation))))
}

pub async fn join_group(
    State(state): State<AppState>,
    Path((id, group_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let installation = require_installation(&state, &id).await?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        let group = state
            .store
            .get_group(&GroupId::from(group_id.clone()))
            .await?
            .ok_or_else(|| ApiError::not_found(format!("group '{group_id}' not found")))?;
        installation.group_id = Some(group.id.clone());
        installation.group_sequence = Some(0);
        state.store.update_installation(&installation).await?;
        state.nudges.group.post();
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

pub async fn leave_group(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let installation = require_installation(&state, &id).await?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        installation.group_id = None;
        installation.group_sequence = None;
        state.store.update_installation(&installation).await?;
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

#[derive(Debug, Deserialize)]
pub struct AnnotateRequest {
    pub name: String,
}

pub async fn add_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnnotateRequest>,
) -> Result<Json<Value>, ApiError> {
    let installation = require_installation(&state, &id).await?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        if !installation.annotations.contains(&body.name) {
            installation.annotations.push(body.name);
        }
        state.store.update_installation(&installation).await?;
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

pub async fn remove_annotation(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let installation = require_installation(&state, &id).await?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        installation.annotations.retain(|a| a != &name);
        state.store.update_installation(&installation).await?;
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

async fn require_installation(state: &AppState, id: &str) -> Result<Installation, ApiError> {
    state
        .store
        .get_installation(&InstallationId::from(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("installation '{id}' not found")))
}

// ── ClusterInstallations ---------------------------------------------------

pub async fn list_cluster_installations(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let cis = state
        .store
        .get_cluster_installations(&ClusterInstallationFilter { page: q.into_page(), ..Default::default() })
        .await?;
    Ok(Json(json!(cis)))
}

pub async fn get_cluster_installation(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(require_ci(&state, &id).await?)))
}

pub async fn get_cluster_installation_config(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let ci = require_ci(&state, &id).await?;
    let installation = state
        .store
        .get_installation(&ci.installation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("owning installation not found"))?;
    let group = match &installation.group_id {
        Some(gid) => state.store.get_group(gid).await?,
        None => None,
    };
    let merged = installation.merged_env(group.as_ref().map(|g| &g.mattermost_env), group.is_some(), group.is_some());
    Ok(Json(json!({ "mattermost_env": merged })))
}

pub async fn update_cluster_installation_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let installation = {
        let ci = require_ci(&state, &id).await?;
        require_installation(&state, ci.installation_id.as_str()).await?
    };
    reject_if_api_locked(installation.api_security_lock)?;
    let installation_id = installation.id.clone();
    let holder = lock_holder();
    lock_installation_or_conflict(&state, &installation_id, &holder).await?;
    let result = async {
        let mut installation = installation;
        installation.priority_env = body;
        if installation.state == strata_domain::InstallationState::Stable {
            installation.state = strata_domain::InstallationState::UpdateRequested;
            state.nudges.installation.post();
        }
        state.store.update_installation(&installation).await?;
        Ok::<_, ApiError>(installation)
    }
    .await;
    state.store.unlock_installation(&installation_id, &holder, false).await?;
    result.map(|installation| Json(json!(installation)))
}

const ALLOWED_EXEC_COMMANDS: &[&str] = &["mattermost-version", "config-reload"];

pub async fn exec_cluster_installation(
    State(state): State<AppState>,
    Path((id, command)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    if !ALLOWED_EXEC_COMMANDS.contains(&command.as_str()) {
        return Err(ApiError::bad_request(format!("command '{command}' is not whitelisted")));
    }
    let ci = require_ci(&state, &id).await?;
    Ok(Json(json!({ "cluster_installation": ci.id, "command": command, "output": "" })))
}

async fn require_ci(state: &AppState, id: &str) -> Result<ClusterInstallation, ApiError> {
    state
        .store
        .get_cluster_installation(&ClusterInstallationId::from(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cluster installation '{id}' not found")))
}

// ── Migration --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    pub source: String,
    pub target: String,
}

pub async fn migrate_create_targets(
    State(state): State<AppState>,
    Json(body): Json<MigrateRequest>,
) -> Result<Json<Value>, ApiError> {
    let created = strata_supervisor::migration::create_target_cluster_installations(
        &state.store,
        &ClusterId::from(body.source),
        &ClusterId::from(body.target),
    )
    .await?;
    state.nudges.cluster_installation.post();
    Ok(Json(json!({ "created": created })))
}

#[derive(Debug, Deserialize)]
pub struct MigrateDnsRequest {
    pub deactivate: String,
    pub activate: String,
}

pub async fn migrate_switch_dns(
    State(state): State<AppState>,
    Json(body): Json<MigrateDnsRequest>,
) -> Result<StatusCode, ApiError> {
    strata_supervisor::migration::switch_dns(
        &state.store,
        &state.drivers,
        &ClusterInstallationId::from(body.deactivate),
        &ClusterInstallationId::from(body.activate),
    )
    .await?;
    Ok(StatusCode::OK)
}

pub async fn migrate_switch_cluster_roles(
    State(state): State<AppState>,
    Json(body): Json<MigrateRequest>,
) -> Result<Json<Value>, ApiError> {
    let source = require_cluster(&state, &body.source).await?;
    let target = require_cluster(&state, &body.target).await?;
    let source_id = source.id.clone();
    let target_id = target.id.clone();
    let holder = lock_holder();

    // Always lock in the same ID order regardless of source/target roles, so two
    // concurrent swaps between the same pair of clusters can't deadlock each other.
    let (first, second) = if source_id.as_str() <= target_id.as_str() { (&source_id, &target_id) } else { (&target_id, &source_id) };
    lock_cluster_or_conflict(&state, first, &holder).await?;
    let second_lock = state.store.lock_cluster(second, &holder, API_LOCK_TTL_NANOS).await;
    let result = async {
        if !matches!(second_lock, Ok(true)) {
            return Err(match second_lock {
                Ok(false) => StoreError::LockConflict { holder: "unknown".to_string() }.into(),
                Err(err) => err.into(),
                Ok(true) => unreachable!(),
            });
        }
        let mut source = source;
        let mut target = target;
        std::mem::swap(&mut source.allow_installations, &mut target.allow_installations);
        state.store.update_cluster(&source).await?;
        state.store.update_cluster(&target).await?;
        Ok::<_, ApiError>((source, target))
    }
    .await;

    if matches!(second_lock, Ok(true)) {
        state.store.unlock_cluster(second, &holder, false).await?;
    }
    state.store.unlock_cluster(first, &holder, false).await?;

    let (source, target) = result?;
    Ok(Json(json!({ "source": source, "target": target })))
}

pub async fn migrate_delete_inactive(State(state): State<AppState>, Path(cluster_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let marked = strata_supervisor::migration::delete_inactive_cluster_installations(&state.store, &ClusterId::from(cluster_id)).await?;
    state.nudges.cluster_installation.post();
    Ok(Json(json!({ "marked": marked })))
}

// ── Groups -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_rolling")]
    pub max_rolling: u32,
    #[serde(default)]
    pub annotations: Vec<String>,
}

fn default_max_rolling() -> u32 {
    1
}

pub async fn list_groups(State(state): State<AppState>, Query(q): Query<PageQuery>) -> Result<Json<Value>, ApiError> {
    let groups = state.store.get_groups(&GroupFilter { page: q.into_page() }).await?;
    Ok(Json(json!(groups)))
}

pub async fn create_group(State(state): State<AppState>, Json(body): Json<CreateGroupRequest>) -> Result<impl IntoResponse, ApiError> {
    let group = Group {
        id: GroupId::new(),
        name: body.name,
        description: body.description,
        version: "stable".into(),
        image: "mattermost/mattermost".into(),
        mattermost_env: HashMap::new(),
        max_rolling: body.max_rolling,
        scheduling: Scheduling { priority_env: HashMap::new() },
        annotations: body.annotations,
        sequence: 1,
        api_security_lock: false,
        delete_at: 0,
        lock: Default::default(),
    };
    let created = state.store.create_group(group).await?;
    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn get_group(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(require_group(&state, &id).await?)))
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchGroupRequest {
    pub version: Option<String>,
    pub image: Option<String>,
    pub mattermost_env: Option<HashMap<String, String>>,
    pub max_rolling: Option<u32>,
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    let group = require_group(&state, &id).await?;
    reject_if_api_locked(group.api_security_lock)?;
    let group_id = group.id.clone();
    let holder = lock_holder();
    lock_group_or_conflict(&state, &group_id, &holder).await?;
    let result = async {
        let mut group = group;
        let mut bump_sequence = false;
        if let Some(version) = body.version {
            group.version = version;
            bump_sequence = true;
        }
        if let Some(image) = body.image {
            group.image = image;
            bump_sequence = true;
        }
        if let Some(env) = body.mattermost_env {
            group.mattermost_env = env;
            bump_sequence = true;
        }
        if let Some(max_rolling) = body.max_rolling {
            group.max_rolling = max_rolling;
        }
        if bump_sequence {
            group.sequence += 1;
            state.nudges.group.post();
        }
        state.store.update_group(&group).await?;
        Ok::<_, ApiError>(group)
    }
    .await;
    state.store.unlock_group(&group_id, &holder, false).await?;
    result.map(|group| Json(json!(group)))
}

pub async fn delete_group(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let group = require_group(&state, &id).await?;
    reject_if_api_locked(group.api_security_lock)?;
    let group_id = group.id.clone();
    let holder = lock_holder();
    lock_group_or_conflict(&state, &group_id, &holder).await?;
    let result = async {
        let members =
            state.store.get_installations(&InstallationFilter { group_id: Some(group_id.clone()), ..Default::default() }).await?;
        if members.iter().any(|i| !i.is_deleted()) {
            return Err(ApiError::forbidden("group still has member installations"));
        }
        state.store.delete_group(&group_id, strata_domain::time::now()).await?;
        Ok::<_, ApiError>(())
    }
    .await;
    state.store.unlock_group(&group_id, &holder, false).await?;
    result.map(|_| StatusCode::OK)
}

pub async fn get_group_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let group = require_group(&state, &id).await?;
    let installations = state.store.get_installations(&InstallationFilter { group_id: Some(group.id.clone()), ..Default::default() }).await?;
    Ok(Json(json!(strata_supervisor::rolling::group_status(&group, &installations))))
}

pub async fn get_all_group_statuses(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let groups = state.store.get_groups(&GroupFilter::default()).await?;
    let mut statuses = Vec::new();
    for group in groups {
        let installations = state.store.get_installations(&InstallationFilter { group_id: Some(group.id.clone()), ..Default::default() }).await?;
        let status = strata_supervisor::rolling::group_status(&group, &installations);
        statuses.push(json!({ "group_id": group.id, "status": status }));
    }
    Ok(Json(json!(statuses)))
}

async fn require_group(state: &AppState, id: &str) -> Result<Group, ApiError> {
    state
        .store
        .get_group(&GroupId::from(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("group '{id}' not found")))
}

// ── Webhooks / Subscriptions ------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub owner_id: String,
    pub url: String,
}

pub async fn list_webhooks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(state.store.get_webhooks(None).await?)))
}

pub async fn create_webhook(State(state): State<AppState>, Json(body): Json<CreateWebhookRequest>) -> Result<impl IntoResponse, ApiError> {
    let webhook = Webhook { id: WebhookId::new(), owner_id: body.owner_id, url: body.url, create_at: strata_domain::time::now(), delete_at: 0 };
    Ok((StatusCode::CREATED, Json(json!(state.store.create_webhook(webhook).await?))))
}

pub async fn get_webhook(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let webhook = state
        .store
        .get_webhook(&WebhookId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("webhook '{id}' not found")))?;
    Ok(Json(json!(webhook)))
}

pub async fn delete_webhook(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.delete_webhook(&WebhookId::from(id), strata_domain::time::now()).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub owner_id: String,
    pub url: String,
    pub event_type: String,
}

pub async fn list_subscriptions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(state.store.get_subscriptions(None).await?)))
}

pub async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = Subscription {
        id: SubscriptionId::new(),
        owner_id: body.owner_id,
        url: body.url,
        event_type: body.event_type,
        last_delivery_status: strata_domain::DeliveryStatus::Pending,
        last_delivery_attempt: 0,
        attempt_count: 0,
        create_at: strata_domain::time::now(),
        delete_at: 0,
    };
    Ok((StatusCode::CREATED, Json(json!(state.store.create_subscription(subscription).await?))))
}

pub async fn get_subscription(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let subscription = state
        .store
        .get_subscription(&SubscriptionId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("subscription '{id}' not found")))?;
    Ok(Json(json!(subscription)))
}

pub async fn delete_subscription(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.delete_subscription(&SubscriptionId::from(id), strata_domain::time::now()).await?;
    Ok(StatusCode::OK)
}

// ── Events -------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct EventsQuery {
    pub subject_id: Option<String>,
    pub event_type: Option<String>,
    pub after_sequence: Option<u64>,
    pub page: Option<u32>,
    pub per_page: Option<i32>,
}

pub async fn list_events(State(state): State<AppState>, Query(q): Query<EventsQuery>) -> Result<Json<Value>, ApiError> {
    let filter = EventsFilter {
        page: PageRequest { page: q.page.unwrap_or(0), per_page: q.per_page.unwrap_or(100), include_deleted: false },
        subject_id: q.subject_id,
        event_type: q.event_type,
        after_sequence: q.after_sequence,
    };
    Ok(Json(json!(state.store.get_events(&filter).await?)))
}

// ── Security locks -------------------------------------------------------

pub async fn api_lock(State(state): State<AppState>, Path((kind, id)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    set_api_lock(&state, &kind, &id, true).await
}

pub async fn api_unlock(State(state): State<AppState>, Path((kind, id)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    set_api_lock(&state, &kind, &id, false).await
}

async fn set_api_lock(state: &AppState, kind: &str, id: &str, locked: bool) -> Result<StatusCode, ApiError> {
    match kind {
        "cluster" => state.store.cluster_api_lock(&ClusterId::from(id.to_string()), locked).await?,
        "installation" => state.store.installation_api_lock(&InstallationId::from(id.to_string()), locked).await?,
        "cluster_installation" => state.store.cluster_installation_api_lock(&ClusterInstallationId::from(id.to_string()), locked).await?,
        "group" => state.store.group_api_lock(&GroupId::from(id.to_string()), locked).await?,
        other => return Err(ApiError::bad_request(format!("unknown resource kind '{other}'"))),
    }
    Ok(StatusCode::OK)
}

pub async fn deletion_lock(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.installation_deletion_lock(&InstallationId::from(id), true).await?;
    Ok(StatusCode::OK)
}

pub async fn deletion_unlock(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.installation_deletion_lock(&InstallationId::from(id), false).await?;
    Ok(StatusCode::OK)
}

// ── Database hierarchy ---------------------------------------------------

pub async fn list_multitenant_databases(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!(state.store.get_multitenant_databases().await?)))
}

pub async fn get_multitenant_database(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let db = state
        .store
        .get_multitenant_database(&MultitenantDatabaseId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("multitenant database '{id}' not found")))?;
    Ok(Json(json!(db)))
}

#[derive(Debug, Deserialize)]
pub struct CreateMultitenantDatabaseRequest {
    pub cluster_id: String,
    pub database_type: strata_domain::DatabaseType,
    #[serde(default = "default_max_installations")]
    pub max_installations_per_logical_database: u32,
}

fn default_max_installations() -> u32 {
    10
}

pub async fn create_multitenant_database(
    State(state): State<AppState>,
    Json(body): Json<CreateMultitenantDatabaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = MultitenantDatabase {
        id: MultitenantDatabaseId::new(),
        cluster_id: ClusterId::from(body.cluster_id),
        database_type: body.database_type,
        max_installations_per_logical_database: body.max_installations_per_logical_database,
        create_at: strata_domain::time::now(),
        delete_at: 0,
    };
    Ok((StatusCode::CREATED, Json(json!(state.store.create_multitenant_database(db).await?))))
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteDatabaseQuery {
    #[serde(default)]
    pub force: bool,
}

pub async fn delete_multitenant_database(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<DeleteDatabaseQuery>,
) -> Result<StatusCode, ApiError> {
    let db_id = MultitenantDatabaseId::from(id.clone());
    let db = state.store.get_multitenant_database(&db_id).await?.ok_or_else(|| ApiError::not_found(format!("multitenant database '{id}' not found")))?;
    if !q.force && state.store.get_cluster(&db.cluster_id).await?.is_some() {
        return Err(ApiError::bad_request("backing cluster still exists; pass force=true to override"));
    }
    state.store.delete_multitenant_database(&db_id, strata_domain::time::now()).await?;
    Ok(StatusCode::OK)
}

pub async fn list_logical_databases(State(state): State<AppState>, Query(q): Query<LogicalDbQuery>) -> Result<Json<Value>, ApiError> {
    let id = q.multitenant_database_id.map(MultitenantDatabaseId::from);
    Ok(Json(json!(state.store.get_logical_databases(id.as_ref()).await?)))
}

#[derive(Debug, Deserialize, Default)]
pub struct LogicalDbQuery {
    pub multitenant_database_id: Option<String>,
}

pub async fn get_logical_database(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let db = state
        .store
        .get_logical_database(&LogicalDatabaseId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("logical database '{id}' not found")))?;
    Ok(Json(json!(db)))
}

#[derive(Debug, Deserialize)]
pub struct CreateLogicalDatabaseRequest {
    pub multitenant_database_id: String,
    pub name: String,
}

pub async fn create_logical_database(
    State(state): State<AppState>,
    Json(body): Json<CreateLogicalDatabaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = LogicalDatabase {
        id: LogicalDatabaseId::new(),
        multitenant_database_id: MultitenantDatabaseId::from(body.multitenant_database_id),
        name: body.name,
        create_at: strata_domain::time::now(),
        delete_at: 0,
    };
    Ok((StatusCode::CREATED, Json(json!(state.store.create_logical_database(db).await?))))
}

pub async fn list_database_schemas(State(state): State<AppState>, Query(q): Query<SchemaQuery>) -> Result<Json<Value>, ApiError> {
    let id = q.logical_database_id.map(LogicalDatabaseId::from);
    Ok(Json(json!(state.store.get_database_schemas(id.as_ref()).await?)))
}

#[derive(Debug, Deserialize, Default)]
pub struct SchemaQuery {
    pub logical_database_id: Option<String>,
}

pub async fn get_database_schema(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let schema = state
        .store
        .get_database_schema(&DatabaseSchemaId::from(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("database schema '{id}' not found")))?;
    Ok(Json(json!(schema)))
}

#[derive(Debug, Deserialize)]
pub struct ApplySchemaRequest {
    pub logical_database_id: String,
    pub installation_id: String,
    pub name: String,
}

pub async fn apply_database_schema(
    State(state): State<AppState>,
    Json(body): Json<ApplySchemaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = DatabaseSchema {
        id: DatabaseSchemaId::new(),
        logical_database_id: LogicalDatabaseId::from(body.logical_database_id),
        installation_id: InstallationId::from(body.installation_id),
        name: body.name,
        state: WorkState::Requested,
        create_at: strata_domain::time::now(),
        delete_at: 0,
        lock: Default::default(),
    };
    let created = state.store.create_database_schema(schema).await?;
    state.nudges.database_schema.post();
    Ok((StatusCode::ACCEPTED, Json(json!(created))))
}

// ── Backups ---------------------------------------------------------------

pub async fn list_backups(State(state): State<AppState>, Path(installation_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let backups = state.store.get_backups_for_installation(&InstallationId::from(installation_id)).await?;
    Ok(Json(json!(backups)))
}

pub async fn create_backup(State(state): State<AppState>, Path(installation_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let backup = Backup {
        id: BackupId::new(),
        installation_id: InstallationId::from(installation_id),
        state: WorkState::Requested,
        create_at: strata_domain::time::now(),
        delete_at: 0,
        lock: Default::default(),
    };
    let created = state.store.create_backup(backup).await?;
    state.nudges.backup.post();
    Ok((StatusCode::ACCEPTED, Json(json!(created))))
}
