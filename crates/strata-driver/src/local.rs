use async_trait::async_trait;
use strata_domain::{Backup, Cluster, ClusterInstallation, DatabaseSchema, Installation};

use crate::driver::{Driver, StepOutcome};
use crate::error::DriverError;

/// No-op driver that advances every step immediately. Used in tests and by
/// `strata-cli bootstrap --ephemeral` so the supervisor loop can be
/// exercised end to end without a real cloud account.
pub struct LocalDriver;

#[async_trait]
impl Driver for LocalDriver {
    async fn provision_cluster(&self, _cluster: &Cluster) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn upgrade_cluster(&self, _cluster: &Cluster) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn resize_cluster(&self, _cluster: &Cluster) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn teardown_cluster(&self, _cluster: &Cluster) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn create_cluster_installation(
        &self,
        _ci: &ClusterInstallation,
        _installation: &Installation,
    ) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn reconcile_cluster_installation(
        &self,
        _ci: &ClusterInstallation,
        _installation: &Installation,
    ) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn delete_cluster_installation(&self, _ci: &ClusterInstallation) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn switch_dns(&self, _installation: &Installation, _target_cluster: &Cluster) -> Result<(), DriverError> {
        Ok(())
    }

    async fn create_schema(&self, _schema: &DatabaseSchema) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn delete_schema(&self, _schema: &DatabaseSchema) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }

    async fn run_backup(&self, _backup: &Backup) -> Result<StepOutcome, DriverError> {
        Ok(StepOutcome::Advance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::{CloudProvider, ClusterId, ClusterState, Lease};

    fn dummy_cluster() -> Cluster {
        Cluster {
            id: ClusterId::new(),
            provider: CloudProvider::Aws,
            provisioner: "local".into(),
            provider_metadata: serde_json::json!({}),
            provisioner_metadata: serde_json::json!({}),
            state: ClusterState::CreationRequested,
            allow_installations: true,
            utility_metadata: serde_json::json!({}),
            annotations: vec![],
            api_security_lock: false,
            create_at: 0,
            delete_at: 0,
            lock: Lease::default(),
        }
    }

    #[tokio::test]
    async fn provision_always_advances() {
        let driver = LocalDriver;
        let outcome = driver.provision_cluster(&dummy_cluster()).await.unwrap();
        assert_eq!(outcome, StepOutcome::Advance);
    }
}
