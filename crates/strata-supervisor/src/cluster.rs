use std::sync::Arc;

use strata_domain::{Cluster, ClusterState};
use strata_driver::{DriverError, DriverRegistry, StepOutcome};
use strata_events::EventBus;
use strata_store::{ClusterFilter, Store};
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::nudge::Nudge;

/// A transient driver failure leaves the resource in place for the next
/// tick to retry; anything else is treated as a hard failure of the step.
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

/// One pass over pending Clusters, implementing §4.3's 7-step contract.
/// Returns the number of Clusters it attempted to step, mostly useful for
/// tests and logging.
pub async fn tick(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &EventBus,
    config: &SupervisorConfig,
) -> Result<usize, SupervisorError> {
    let pending = store
        .get_clusters(&ClusterFilter {
            page: strata_domain::PageRequest {
                page: 0,
                per_page: config.batch_size as i32,
                include_deleted: false,
            },
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|c| c.state.is_pending())
        .collect::<Vec<_>>();

    let mut attempted = 0;
    for cluster in pending {
        if step_one(store, drivers, events, config, cluster).await? {
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
    cluster: Cluster,
) -> Result<bool, SupervisorError> {
    let id = cluster.id.clone();
    if !store.lock_cluster(&id, &config.replica_id, config.lease_ttl_nanos()).await? {
        debug!(cluster_id = %id, "cluster lock contended, skipping");
        return Ok(false);
    }

    let result = async {
        let Some(current) = store.get_cluster(&id).await? else {
            return Ok(false);
        };
        if !current.state.is_pending() {
            return Ok(false);
        }

        let driver = drivers.get(&current.provisioner)?;
        let (call_outcome, advance_to, fail_to) = match current.state {
            ClusterState::CreationRequested | ClusterState::CreationInProgress => {
                (as_outcome(driver.provision_cluster(&current).await), ClusterState::Stable, ClusterState::CreationFailed)
            }
            ClusterState::ProvisioningRequested | ClusterState::Provisioning => {
                (as_outcome(driver.provision_cluster(&current).await), ClusterState::Stable, ClusterState::ProvisioningFailed)
            }
            ClusterState::UpgradeRequested | ClusterState::Upgrading => {
                (as_outcome(driver.upgrade_cluster(&current).await), ClusterState::Stable, ClusterState::UpgradeFailed)
            }
            ClusterState::ResizeRequested | ClusterState::Resizing => {
                (as_outcome(driver.resize_cluster(&current).await), ClusterState::Stable, ClusterState::ResizeFailed)
            }
            ClusterState::DeletionRequested | ClusterState::DeletionInProgress => {
                (as_outcome(driver.teardown_cluster(&current).await), ClusterState::Deleted, ClusterState::DeletionFailed)
            }
            other => {
                warn!(cluster_id = %id, state = %other, "pending cluster in unhandled state");
                return Ok(false);
            }
        };

        let old_state = current.state;
        let mut next = current;
        next.state = match call_outcome {
            StepOutcome::Advance => advance_to,
            StepOutcome::RetrySame => old_state,
            StepOutcome::Failed { reason } => {
                warn!(cluster_id = %id, %reason, "cluster step failed");
                fail_to
            }
        };

        store.update_cluster(&next).await?;
        events
            .publish("cluster.transitioned", id.as_str(), old_state.as_str(), next.state.as_str(), serde_json::json!({}))
            .await?;
        info!(cluster_id = %id, from = %old_state, to = %next.state, "cluster stepped");
        Ok(true)
    }
    .await;

    store.unlock_cluster(&id, &config.replica_id, false).await?;
    result
}

/// Drives the periodic tick / nudge loop until cancelled.
pub async fn run(
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    events: Arc<EventBus>,
    config: SupervisorConfig,
    nudge: Nudge,
) {
    loop {
        if let Err(err) = tick(&store, &drivers, &events, &config).await {
            warn!(%err, "cluster supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
