use std::time::Duration;

/// Shared tuning knobs every per-kind supervisor loop is built from.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Identity this replica presents when acquiring leases.
    pub replica_id: String,
    pub tick_interval: Duration,
    pub lease_ttl: Duration,
    /// Maximum candidates pulled from the Store per iteration.
    pub batch_size: i64,
}

impl SupervisorConfig {
    pub fn lease_ttl_nanos(&self) -> i64 {
        self.lease_ttl.as_nanos() as i64
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            replica_id: format!("replica-{}", strata_domain::id::ClusterId::new().as_str()),
            tick_interval: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(120),
            batch_size: 50,
        }
    }
}
