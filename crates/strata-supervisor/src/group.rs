use std::sync::Arc;

use strata_domain::InstallationState;
use strata_events::EventBus;
use strata_store::{GroupFilter, InstallationFilter, Store};
use tracing::{info, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::nudge::Nudge;
use crate::rolling::select_rollout_batch;

/// Groups have no pending/stable state machine of their own — this loop is
/// what actually drives the rolling update described in §4.5, by kicking
/// eligible member Installations into `update-requested` each pass. The
/// Installation supervisor does the rest.
pub async fn tick(store: &Arc<dyn Store>, events: &EventBus, config: &SupervisorConfig) -> Result<usize, SupervisorError> {
    let groups = store.get_groups(&GroupFilter::default()).await?;
    let mut rolled = 0;

    for group in groups.into_iter().filter(|g| !g.is_deleted()) {
        if !store.lock_group(&group.id, &config.replica_id, config.lease_ttl_nanos()).await? {
            continue;
        }

        let result: Result<(), SupervisorError> = async {
            let installations = store
                .get_installations(&InstallationFilter { group_id: Some(group.id.clone()), ..Default::default() })
                .await?;
            let batch = select_rollout_batch(&group, &installations);
            for installation_id in &batch {
                if let Some(mut installation) = store.get_installation(installation_id).await? {
                    if installation.state != InstallationState::Stable {
                        continue;
                    }
                    installation.version = group.version.clone();
                    installation.image = group.image.clone();
                    installation.group_sequence = Some(group.sequence);
                    let old_state = installation.state;
                    installation.state = InstallationState::UpdateRequested;
                    store.update_installation(&installation).await?;
                    events
                        .publish(
                            "installation.transitioned",
                            installation.id.as_str(),
                            old_state.as_str(),
                            installation.state.as_str(),
                            serde_json::json!({"reason": "group-rollout"}),
                        )
                        .await?;
                }
            }
            if !batch.is_empty() {
                info!(group_id = %group.id, rolled = batch.len(), "kicked installations into group rollout");
                rolled += batch.len();
            }
            Ok(())
        }
        .await;

        store.unlock_group(&group.id, &config.replica_id, false).await?;
        result?;
    }

    Ok(rolled)
}

pub async fn run(store: Arc<dyn Store>, events: Arc<EventBus>, config: SupervisorConfig, nudge: Nudge) {
    loop {
        if let Err(err) = tick(&store, &events, &config).await {
            warn!(%err, "group supervisor tick failed");
        }
        nudge.drain();
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = nudge.wait() => {}
        }
    }
}
