use std::sync::Arc;

use strata_driver::DriverRegistry;
use strata_events::EventBus;
use strata_store::Store;
use strata_supervisor::Nudge;

/// One coalescing nudge per per-kind supervisor loop — handlers wake only
/// the loop relevant to the resource they just mutated.
#[derive(Clone)]
pub struct Nudges {
    pub cluster: Nudge,
    pub installation: Nudge,
    pub cluster_installation: Nudge,
    pub group: Nudge,
    pub database_schema: Nudge,
    pub backup: Nudge,
}

impl Default for Nudges {
    fn default() -> Self {
        Self {
            cluster: Nudge::new(),
            installation: Nudge::new(),
            cluster_installation: Nudge::new(),
            group: Nudge::new(),
            database_schema: Nudge::new(),
            backup: Nudge::new(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub drivers: Arc<DriverRegistry>,
    pub events: Arc<EventBus>,
    pub nudges: Nudges,
    pub auth_token: Arc<String>,
}
