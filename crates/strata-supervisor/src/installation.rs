use std::sync::Arc;

use strata_domain::{Affinity, ClusterInstallation, ClusterInstallationId, ClusterInstallationState, Installation, InstallationState};
use strata_driver::{DriverError, DriverRegistry, StepOutcome};
use strata_events::EventBus;
use strata_store::{ClusterFilter, ClusterInstallationFilter, InstallationFilter, Store};
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::nudge::Nudge;
use crate::scheduler::{is_isolated_eligible, select_cluster};

fn as_outcome(result: Result<StepOutcome, DriverError>) -> StepOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(DriverError::Retriable(reason)) => {
            debug!(%reason, "driver reported a retriable failure");
            StepOutcome::RetrySame
        }
        Err(other) => StepOutcome::Failed { reason: other.to_string() },
    }
}

pub async fn tick(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    config: &SupervisorConfig,
) -> Result<usize, SupervisorError> {
    let pending = store
        .get_installations(&InstallationFilter {
            page: strata_domain::PageRequest {
                page: 0,
                per_page: config.batch_size as i32,
                include_deleted: false,
            },
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|i| i.state.is_pending())
        .collect::<Vec<_>>();

    let mut attempted = 0;
    for installation in pending {
        if step_one(store, drivers, events, config, installation).await? {
            attempted += 1;
        }
    }
    Ok(attempted)
}

async fn step_one(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    config: &SupervisorConfig,
    installation: Installation,
) -> Result<bool, SupervisorError> {
    let id = installation.id.clone();
    if !store.lock_installation(&id, &config.replica_id, config.lease_ttl_nanos()).await? {
        debug!(installation_id = %id, "installation lock contended, skipping");
        return Ok(false);
    }

    let result = async {
        let Some(current) = store.get_installation(&id).await? else {
            return Ok(false);
        };
        if !current.state.is_pending() {
            return Ok(false);
        }

        match current.state {
            InstallationState::CreationRequested | InstallationState::CreationInProgress => {
                handle_creation(store, drivers, events, config, current).await
            }
            InstallationState::DeletionRequested | InstallationState::DeletionInProgress => {
                handle_deletion(store, drivers, events, current).await
            }
            InstallationState::UpdateRequested
            | InstallationState::UpdateInProgress
            | InstallationState::HibernationRequested
            | InstallationState::WakeupRequested
            | InstallationState::WakingUp => handle_reconcile_driven(store, drivers, events, current).await,
            other => {
                warn!(installation_id = %id, state = %other, "pending installation in unhandled state");
                Ok(false)
            }
        }
    }
    .await;

    store.unlock_installation(&id, &config.replica_id, false).await?;
    result
}

/// Installations with no ClusterInstallation yet need a Cluster picked
/// before anything else can happen (§4.4). Isolated affinity additionally
/// requires the chosen Cluster to have zero active CIs.
async fn handle_creation(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    config: &SupervisorConfig,
    mut installation: Installation,
) -> Result<bool, SupervisorError> {
    let existing_ci = store
        .get_cluster_installations(&ClusterInstallationFilter {
            installation_id: Some(installation.id.clone()),
            ..Default::default()
        })
        .await?;

    let ci = if let Some(ci) = existing_ci.into_iter().find(|ci| !ci.is_deleted()) {
        ci
    } else {
        let clusters = store.get_clusters(&ClusterFilter::default()).await?;
        let active_ci_counts = if installation.affinity == Affinity::Isolated {
            let mut counts = std::collections::HashMap::new();
            for existing in store
                .get_cluster_installations(&ClusterInstallationFilter { is_active: Some(true), ..Default::default() })
                .await?
            {
                *counts.entry(existing.cluster_id).or_insert(0u32) += 1;
            }
            Some(counts)
        } else {
            None
        };
        let cluster_id = select_cluster(&clusters, &installation, |id| match &active_ci_counts {
            Some(counts) => is_isolated_eligible(id, counts),
            None => true,
        })
        .ok();

        let Some(cluster_id) = cluster_id else {
            let old_state = installation.state;
            installation.state = InstallationState::CreationNoCompatibleClusters;
            store.update_installation(&installation).await?;
            events
                .publish(
                    "installation.transitioned",
                    installation.id.as_str(),
                    old_state.as_str(),
                    installation.state.as_str(),
                    serde_json::json!({}),
                )
                .await?;
            return Ok(true);
        };

        store
            .create_cluster_installation(ClusterInstallation {
                id: ClusterInstallationId::new(),
                cluster_id,
                installation_id: installation.id.clone(),
                namespace: format!("installation-{}", installation.id.as_str()),
                state: ClusterInstallationState::CreationRequested,
                is_active: true,
                api_security_lock: false,
                create_at: strata_domain::time::now(),
                delete_at: 0,
                lock: Default::default(),
            })
            .await?
    };

    let cluster = store
        .get_cluster(&ci.cluster_id)
        .await?
        .ok_or_else(|| SupervisorError::Internal("cluster installation references missing cluster".into()))?;
    let driver = drivers.get(&cluster.provisioner)?;

    let old_state = installation.state;
    installation.state = match as_outcome(driver.create_cluster_installation(&ci, &installation).await) {
        StepOutcome::Advance => InstallationState::Stable,
        StepOutcome::RetrySame => old_state,
        StepOutcome::Failed { reason } => {
            warn!(installation_id = %installation.id, %reason, "installation creation failed");
            InstallationState::CreationFailed
        }
    };
    store.update_installation(&installation).await?;
    events
        .publish(
            "installation.transitioned",
            installation.id.as_str(),
            old_state.as_str(),
            installation.state.as_str(),
            serde_json::json!({}),
        )
        .await?;
    info!(installation_id = %installation.id, from = %old_state, to = %installation.state, "installation stepped");
    Ok(true)
}

/// Update, hibernate and wakeup all resolve to reconciling the active CI
/// against the Installation's current desired config.
async fn handle_reconcile_driven(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    mut installation: Installation,
) -> Result<bool, SupervisorError> {
    let active_ci = store
        .get_cluster_installations(&ClusterInstallationFilter {
            installation_id: Some(installation.id.clone()),
            is_active: Some(true),
            ..Default::default()
        })
        .await?
        .into_iter()
        .next();

    let Some(ci) = active_ci else {
        return Err(SupervisorError::Internal("pending installation has no active cluster installation".into()));
    };

    let cluster = store
        .get_cluster(&ci.cluster_id)
        .await?
        .ok_or_else(|| SupervisorError::Internal("cluster installation references missing cluster".into()))?;
    let driver = drivers.get(&cluster.provisioner)?;

    let old_state = installation.state;
    let (stable_state, failed_state) = match old_state {
        InstallationState::HibernationRequested => (InstallationState::Hibernating, InstallationState::HibernationFailed),
        InstallationState::WakeupRequested | InstallationState::WakingUp => {
            (InstallationState::Stable, InstallationState::WakeupFailed)
        }
        _ => (InstallationState::Stable, InstallationState::UpdateFailed),
    };

    installation.state = match as_outcome(driver.reconcile_cluster_installation(&ci, &installation).await) {
        StepOutcome::Advance => stable_state,
        StepOutcome::RetrySame => old_state,
        StepOutcome::Failed { reason } => {
            warn!(installation_id = %installation.id, %reason, "installation reconcile failed");
            failed_state
        }
    };
    store.update_installation(&installation).await?;
    events
        .publish(
            "installation.transitioned",
            installation.id.as_str(),
            old_state.as_str(),
            installation.state.as_str(),
            serde_json::json!({}),
        )
        .await?;
    Ok(true)
}

async fn handle_deletion(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    mut installation: Installation,
) -> Result<bool, SupervisorError> {
    let cis = store
        .get_cluster_installations(&ClusterInstallationFilter {
            installation_id: Some(installation.id.clone()),
            ..Default::default()
        })
        .await?;

    for ci in cis.into_iter().filter(|ci| !ci.is_deleted()) {
        let cluster = store.get_cluster(&ci.cluster_id).await?;
        if let Some(cluster) = cluster {
            let driver = drivers.get(&cluster.provisioner)?;
            match as_outcome(driver.delete_cluster_installation(&ci).await) {
                StepOutcome::Advance => store.delete_cluster_installation(&ci.id, strata_domain::time::now()).await?,
                StepOutcome::RetrySame => {}
                StepOutcome::Failed { reason } => {
                    warn!(cluster_installation_id = %ci.id, %reason, "cluster installation teardown failed");
                }
            }
        }
    }

    let old_state = installation.state;
    let remaining_active = store
        .get_cluster_installations(&ClusterInstallationFilter { installation_id: Some(installation.id.clone()), ..Default::default() })
        .await?
        .into_iter()
        .any(|ci| !ci.is_deleted());

    installation.state = if remaining_active {
        InstallationState::DeletionRequested
    } else {
        InstallationState::Deleted
    };
    if installation.state == InstallationState::Deleted && installation.delete_at == 0 {
        installation.delete_at = strata_domain::time::now();
    }
    store.update_installation(&installation).await?;
    events
        .publish(
            "installation.transitioned",
            installation.id.as_str(),
            old_state.as_str(),
            installation.state.as_str(),
            serde_json::json!({}),
        )
        .await?;
    Ok(true)
}

pub async fn run(
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    events: Arc<EventBus>,
    config: SupervisorConfig,
    nudge: Nudge,
) {
    loop {
        if let Err(err) = tick(&store, &drivers, &events, &config).await {
            warn!(%err, "installation supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
