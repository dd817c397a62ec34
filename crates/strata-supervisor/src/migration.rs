use std::sync::Arc;

use strata_domain::{ClusterId, ClusterInstallation, ClusterInstallationId, ClusterInstallationState};
use strata_driver::DriverRegistry;
use strata_store::{ClusterInstallationFilter, Store};
use tracing::info;

use crate::error::SupervisorError;

/// API-invoked migration phases (§4.6). Unlike the continuously-polled
/// per-kind loops above, these run to completion within one call — a
/// client drives the three phases explicitly rather than waiting on a
/// tick. Each phase still leaves individual resources in a pending state
/// that the ordinary Cluster/Installation/ClusterInstallation supervisors
/// pick up and finish, so a crash mid-migration is always recoverable.
/// Create a target ClusterInstallation for every active, non-hibernated
/// Installation currently on `source`, mirroring it onto `target`.
/// Requires `source.allow_installations == false` (it must have already
/// stopped accepting new placements).
pub async fn create_target_cluster_installations(
    store: &Arc<dyn Store>,
    source: &ClusterId,
    target: &ClusterId,
) -> Result<Vec<ClusterInstallationId>, SupervisorError> {
    let source_cluster = store
        .get_cluster(source)
        .await?
        .ok_or_else(|| SupervisorError::Internal("migration source cluster not found".into()))?;
    if source_cluster.allow_installations {
        return Err(SupervisorError::Scheduling(
            "source cluster still accepts installations; disable it before migrating".into(),
        ));
    }

    let active = store
        .get_cluster_installations(&ClusterInstallationFilter { cluster_id: Some(source.clone()), is_active: Some(true), ..Default::default() })
        .await?;

    let mut created = Vec::new();
    for source_ci in active.into_iter().filter(|ci| !ci.is_deleted()) {
        let already_targeted = store
            .get_cluster_installations(&ClusterInstallationFilter { installation_id: Some(source_ci.installation_id.clone()), cluster_id: Some(target.clone()), ..Default::default() })
            .await?
            .into_iter()
            .any(|ci| !ci.is_deleted());
        if already_targeted {
            continue;
        }

        let target_ci = store
            .create_cluster_installation(ClusterInstallation {
                id: ClusterInstallationId::new(),
                cluster_id: target.clone(),
                installation_id: source_ci.installation_id.clone(),
                namespace: source_ci.namespace.clone(),
                state: ClusterInstallationState::CreationRequested,
                is_active: false,
                api_security_lock: false,
                create_at: strata_domain::time::now(),
                delete_at: 0,
                lock: Default::default(),
            })
            .await?;
        created.push(target_ci.id);
    }

    info!(source = %source, target = %target, created = created.len(), "migration: target cluster installations created");
    Ok(created)
}

/// Atomically flips traffic from `deactivate` to `activate` for one
/// Installation: store-side `isActive` swap first, then point the driver's
/// DNS at the new target. A hibernated Installation has no live DNS record
/// to flip — the swap still happens so the next wakeup targets the right
/// cluster, but `switch_dns` is skipped.
pub async fn switch_dns(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    deactivate: &ClusterInstallationId,
    activate: &ClusterInstallationId,
) -> Result<(), SupervisorError> {
    let active_ci = store
        .get_cluster_installation(activate)
        .await?
        .ok_or_else(|| SupervisorError::Internal("migration target cluster installation not found".into()))?;
    let installation = store
        .get_installation(&active_ci.installation_id)
        .await?
        .ok_or_else(|| SupervisorError::Internal("migration cluster installation references missing installation".into()))?;

    store.swap_active_cluster_installation(deactivate, activate).await?;

    if installation.state != strata_domain::InstallationState::Hibernating {
        let target_cluster = store
            .get_cluster(&active_ci.cluster_id)
            .await?
            .ok_or_else(|| SupervisorError::Internal("migration target cluster installation references missing cluster".into()))?;
        let driver = drivers.get(&target_cluster.provisioner)?;
        driver.switch_dns(&installation, &target_cluster).await?;
    }

    info!(installation_id = %installation.id, deactivate = %deactivate, activate = %activate, "migration: dns switched");
    Ok(())
}

/// Marks now-inactive ClusterInstallations on `source` as `deletion-requested`;
/// the ClusterInstallation supervisor picks them up from there, calls the
/// driver to tear down workload resources, and only then hard-deletes the row.
pub async fn delete_inactive_cluster_installations(store: &Arc<dyn Store>, source: &ClusterId) -> Result<usize, SupervisorError> {
    let inactive = store
        .get_cluster_installations(&ClusterInstallationFilter { cluster_id: Some(source.clone()), is_active: Some(false), ..Default::default() })
        .await?;

    let mut marked = 0;
    for mut ci in inactive.into_iter().filter(|ci| !ci.is_deleted()) {
        ci.state = ClusterInstallationState::DeletionRequested;
        store.update_cluster_installation(&ci).await?;
        marked += 1;
    }
    info!(source = %source, marked, "migration: inactive cluster installations marked for deletion");
    Ok(marked)
}
