use std::sync::Arc;

use strata_domain::{Backup, WorkState};
use strata_driver::{Driver, DriverError, StepOutcome};
use strata_events::EventBus;
use strata_store::Store;
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

/// Backups only ever belong to one Installation at a time, and `Store` has
/// no global `list pending backups` query — the supervisor instead walks
/// each Installation's own backup history, which is small by construction
/// (one running backup per Installation, enforced at the API layer).
pub async fn tick(
    store: &Arc<dyn Store>,
    driver: &Arc<dyn Driver>,
    events: &EventBus,
    config: &SupervisorConfig,
    installation_ids: &[strata_domain::InstallationId],
) -> Result<usize, SupervisorError> {
    let mut attempted = 0;
    for installation_id in installation_ids {
        let pending = store
            .get_backups_for_installation(installation_id)
            .await?
            .into_iter()
            .filter(|b| b.state.is_pending())
            .collect::<Vec<_>>();
        for backup in pending {
            if step_one(store, driver, events, config, backup).await? {
                attempted += 1;
            }
        }
    }
    Ok(attempted)
}

async fn step_one(
    store: &Arc<dyn Store>,
    driver: &Arc<dyn Driver>,
    events: &EventBus,
    config: &SupervisorConfig,
    backup: Backup,
) -> Result<bool, SupervisorError> {
    let id = backup.id.clone();
    if !store.lock_backup(&id, &config.replica_id, config.lease_ttl_nanos()).await? {
        debug!(backup_id = %id, "backup lock contended, skipping");
        return Ok(false);
    }

    let result = async {
        let mut current = backup;
        if !current.state.is_pending() {
            return Ok(false);
        }

        let old_state = current.state;
        current.state = match as_outcome(driver.run_backup(&current).await) {
            StepOutcome::Advance => WorkState::Stable,
            StepOutcome::RetrySame => old_state,
            StepOutcome::Failed { reason } => {
                warn!(backup_id = %id, %reason, "backup failed");
                WorkState::Failed
            }
        };
        store.update_backup(&current).await?;
        events
            .publish("backup.transitioned", id.as_str(), old_state.as_str(), current.state.as_str(), serde_json::json!({}))
            .await?;
        Ok(true)
    }
    .await;

    store.unlock_backup(&id, &config.replica_id, false).await?;
    result
}

pub async fn run(store: Arc<dyn Store>, driver: Arc<dyn Driver>, events: Arc<EventBus>, config: SupervisorConfig, nudge: Nudge) {
    loop {
        let installation_ids: Vec<_> = match store.get_installations(&strata_store::InstallationFilter::default()).await {
            Ok(installations) => installations.into_iter().map(|i| i.id).collect(),
            Err(err) => {
                warn!(%err, "backup supervisor failed to list installations");
                Vec::new()
            }
        };
        if let Err(err) = tick(&store, &driver, &events, &config, &installation_ids).await {
            warn!(%err, "backup supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
