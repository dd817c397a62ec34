use async_trait::async_trait;
use strata_domain::{Backup, Cluster, ClusterInstallation, DatabaseSchema, Installation};

use crate::error::DriverError;

/// What a single driver call told the supervisor to do next, mirroring
/// §4.3 step 4: "the driver returns the next state (success path), a
/// retry-same state, or a failure state."
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advance,
    RetrySame,
    Failed { reason: String },
}

/// The opaque capability supervisors invoke to effect infrastructure
/// changes. Everything below this trait — talking to a cloud provider's
/// control plane, running Terraform, pushing a Kubernetes manifest — is
/// deliberately not this crate's concern; only the contract supervisors
/// depend on lives here.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn provision_cluster(&self, cluster: &Cluster) -> Result<StepOutcome, DriverError>;
    async fn upgrade_cluster(&self, cluster: &Cluster) -> Result<StepOutcome, DriverError>;
    async fn resize_cluster(&self, cluster: &Cluster) -> Result<StepOutcome, DriverError>;
    async fn teardown_cluster(&self, cluster: &Cluster) -> Result<StepOutcome, DriverError>;

    async fn create_cluster_installation(
        &self,
        ci: &ClusterInstallation,
        installation: &Installation,
    ) -> Result<StepOutcome, DriverError>;

    async fn reconcile_cluster_installation(
        &self,
        ci: &ClusterInstallation,
        installation: &Installation,
    ) -> Result<StepOutcome, DriverError>;

    async fn delete_cluster_installation(&self, ci: &ClusterInstallation) -> Result<StepOutcome, DriverError>;

    /// Points the target cluster's load balancer / DNS record at the given
    /// installation. Called once per Installation inside a migration DNS
    /// switch — the supervisor commits the store-side flip itself.
    async fn switch_dns(&self, installation: &Installation, target_cluster: &Cluster) -> Result<(), DriverError>;

    async fn create_schema(&self, schema: &DatabaseSchema) -> Result<StepOutcome, DriverError>;
    async fn delete_schema(&self, schema: &DatabaseSchema) -> Result<StepOutcome, DriverError>;

    async fn run_backup(&self, backup: &Backup) -> Result<StepOutcome, DriverError>;
}
