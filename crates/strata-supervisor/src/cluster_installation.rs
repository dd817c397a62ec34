use std::sync::Arc;

use strata_domain::{ClusterInstallation, ClusterInstallationState};
use strata_driver::{DriverError, DriverRegistry, StepOutcome};
use strata_events::EventBus;
use strata_store::{ClusterInstallationFilter, Store};
use tracing::{debug, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::nudge::Nudge;

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

/// Reconciles `ClusterInstallation`s directly — the Installation supervisor
/// drives creation/deletion of the first CI, but a standing CI can also
/// need reconciling on its own when a Cluster-side change (upgrade, config
/// drift) requires it without the owning Installation itself moving.
pub async fn tick(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    config: &SupervisorConfig,
) -> Result<usize, SupervisorError> {
    let pending = store
        .get_cluster_installations(&ClusterInstallationFilter {
            page: strata_domain::PageRequest {
                page: 0,
                per_page: config.batch_size as i32,
                include_deleted: false,
            },
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|ci| {
            matches!(
                ci.state,
                ClusterInstallationState::ReconcilingRequested
                    | ClusterInstallationState::Reconciling
                    | ClusterInstallationState::DeletionRequested
                    | ClusterInstallationState::DeletionInProgress
            )
        })
        .collect::<Vec<_>>();

    let mut attempted = 0;
    for ci in pending {
        if step_one(store, drivers, events, config, ci).await? {
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
    ci: ClusterInstallation,
) -> Result<bool, SupervisorError> {
    let id = ci.id.clone();
    if !store.lock_cluster_installation(&id, &config.replica_id, config.lease_ttl_nanos()).await? {
        debug!(cluster_installation_id = %id, "cluster installation lock contended, skipping");
        return Ok(false);
    }

    let result = async {
        let Some(mut current) = store.get_cluster_installation(&id).await? else {
            return Ok(false);
        };
        if !current.state.is_pending() {
            return Ok(false);
        }

        let cluster = store
            .get_cluster(&current.cluster_id)
            .await?
            .ok_or_else(|| SupervisorError::Internal("cluster installation references missing cluster".into()))?;
        let installation = store
            .get_installation(&current.installation_id)
            .await?
            .ok_or_else(|| SupervisorError::Internal("cluster installation references missing installation".into()))?;
        let driver = drivers.get(&cluster.provisioner)?;

        let old_state = current.state;
        let is_deleting = matches!(old_state, ClusterInstallationState::DeletionRequested | ClusterInstallationState::DeletionInProgress);
        let outcome = if is_deleting {
            as_outcome(driver.delete_cluster_installation(&current).await)
        } else {
            as_outcome(driver.reconcile_cluster_installation(&current, &installation).await)
        };

        // A successful deletion removes the row outright rather than
        // transitioning to a terminal `Deleted` state that would still
        // need to be listed and paged around.
        if is_deleting && outcome == StepOutcome::Advance {
            store.delete_cluster_installation(&id, strata_domain::time::now()).await?;
            events
                .publish("cluster_installation.transitioned", id.as_str(), old_state.as_str(), ClusterInstallationState::Deleted.as_str(), serde_json::json!({}))
                .await?;
            return Ok(true);
        }

        current.state = match (is_deleting, outcome) {
            (_, StepOutcome::RetrySame) => old_state,
            (true, StepOutcome::Failed { reason }) => {
                warn!(cluster_installation_id = %id, %reason, "cluster installation teardown failed");
                ClusterInstallationState::DeletionFailed
            }
            (false, StepOutcome::Advance) => ClusterInstallationState::Stable,
            (false, StepOutcome::Failed { reason }) => {
                warn!(cluster_installation_id = %id, %reason, "cluster installation reconcile failed");
                ClusterInstallationState::ReconcileFailed
            }
            (true, StepOutcome::Advance) => unreachable!("handled above"),
        };
        store.update_cluster_installation(&current).await?;
        events
            .publish("cluster_installation.transitioned", id.as_str(), old_state.as_str(), current.state.as_str(), serde_json::json!({}))
            .await?;
        Ok(true)
    }
    .await;

    store.unlock_cluster_installation(&id, &config.replica_id, false).await?;
    result
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
            warn!(%err, "cluster installation supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
