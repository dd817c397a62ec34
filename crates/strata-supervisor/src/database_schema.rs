use std::sync::Arc;

use strata_domain::{DatabaseSchema, WorkState};
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

/// DatabaseSchema has no Cluster of its own, so it is stepped with a
/// single fixed driver rather than the per-Cluster provisioner registry —
/// schema provisioning runs against the multitenant database layer, not a
/// workload cluster.
pub async fn tick(
    store: &Arc<dyn Store>,
    driver: &Arc<dyn Driver>,
    events: &EventBus,
    config: &SupervisorConfig,
) -> Result<usize, SupervisorError> {
    let pending = store
        .get_database_schemas(None)
        .await?
        .into_iter()
        .filter(|s| s.state.is_pending())
        .take(config.batch_size as usize)
        .collect::<Vec<_>>();

    let mut attempted = 0;
    for schema in pending {
        if step_one(store, driver, events, config, schema).await? {
            attempted += 1;
        }
    }
    Ok(attempted)
}

async fn step_one(
    store: &Arc<dyn Store>,
    driver: &Arc<dyn Driver>,
    events: &EventBus,
    config: &SupervisorConfig,
    schema: DatabaseSchema,
) -> Result<bool, SupervisorError> {
    let id = schema.id.clone();
    if !store.lock_database_schema(&id, &config.replica_id, config.lease_ttl_nanos()).await? {
        debug!(schema_id = %id, "database schema lock contended, skipping");
        return Ok(false);
    }

    let result = async {
        let Some(mut current) = store.get_database_schema(&id).await? else {
            return Ok(false);
        };
        if !current.state.is_pending() {
            return Ok(false);
        }

        let old_state = current.state;
        let (call, advance_to, fail_to) = match old_state {
            WorkState::Requested | WorkState::InProgress => {
                (driver.create_schema(&current).await, WorkState::Stable, WorkState::Failed)
            }
            WorkState::DeletionRequested | WorkState::DeletionInProgress => {
                (driver.delete_schema(&current).await, WorkState::Deleted, WorkState::DeletionFailed)
            }
            _ => return Ok(false),
        };

        current.state = match as_outcome(call) {
            StepOutcome::Advance => advance_to,
            StepOutcome::RetrySame => old_state,
            StepOutcome::Failed { reason } => {
                warn!(schema_id = %id, %reason, "database schema step failed");
                fail_to
            }
        };
        store.update_database_schema(&current).await?;
        events
            .publish("database_schema.transitioned", id.as_str(), old_state.as_str(), current.state.as_str(), serde_json::json!({}))
            .await?;
        Ok(true)
    }
    .await;

    store.unlock_database_schema(&id, &config.replica_id, false).await?;
    result
}

pub async fn run(store: Arc<dyn Store>, driver: Arc<dyn Driver>, events: Arc<EventBus>, config: SupervisorConfig, nudge: Nudge) {
    loop {
        if let Err(err) = tick(&store, &driver, &events, &config).await {
            warn!(%err, "database schema supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
