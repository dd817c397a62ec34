use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::Driver;
use crate::error::DriverError;

/// Dispatches to a `Driver` by the `provisioner` string carried on each
/// Cluster (`kops`, `eks`, ...). A single default entry covers the common
/// case of one provisioner per deployment; additional entries let one
/// control-plane process operate clusters provisioned by more than one
/// backend at once.
pub struct DriverRegistry {
    default_provisioner: String,
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new(default_provisioner: impl Into<String>) -> Self {
        Self {
            default_provisioner: default_provisioner.into(),
            drivers: HashMap::new(),
        }
    }

    pub fn register(mut self, provisioner: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(provisioner.into(), driver);
        self
    }

    pub fn get(&self, provisioner: &str) -> Result<Arc<dyn Driver>, DriverError> {
        self.drivers
            .get(provisioner)
            .cloned()
            .ok_or_else(|| DriverError::NotConfigured(provisioner.to_string()))
    }

    pub fn default_driver(&self) -> Result<Arc<dyn Driver>, DriverError> {
        self.get(&self.default_provisioner)
    }
}
