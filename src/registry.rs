//! Name keyed registry of storage-driver factories.
//!
//! Nothing registers itself: the embedding process builds a
//! [`DriverRegistry`] during bootstrap, registers the drivers it ships with
//! (e.g. through [`register_hdfs`]) and then instantiates drivers by the name
//! found in its configuration.

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    config::{DriverConfig, Parameters},
    driver::{
        dfs::{DfsDriver, DRIVER_NAME},
        StorageDriver,
    },
    error::DriverError,
    fs::ClientFactory,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("storage driver not registered: {0}")]
    Unknown(String),
    #[error("storage driver registered twice: {0}")]
    Duplicate(String),
    #[error("failed to build storage driver: {0}")]
    Driver(#[from] DriverError),
}

/// Builds a driver from a configuration map.
pub trait DriverFactory: Send + Sync {
    fn create(&self, parameters: &Parameters) -> Result<Arc<dyn StorageDriver>, DriverError>;
}

#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn DriverFactory>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn create(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Arc<dyn StorageDriver>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        Ok(factory.create(parameters)?)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Creates HDFS drivers whose clients come from `F`.
#[derive(Debug, Clone)]
pub struct HdfsDriverFactory<F> {
    clients: F,
}

impl<F> HdfsDriverFactory<F>
where
    F: ClientFactory + Clone,
{
    pub fn new(clients: F) -> Self {
        HdfsDriverFactory { clients }
    }
}

impl<F> DriverFactory for HdfsDriverFactory<F>
where
    F: ClientFactory + Clone,
{
    fn create(&self, parameters: &Parameters) -> Result<Arc<dyn StorageDriver>, DriverError> {
        let config = DriverConfig::from_parameters(parameters)?;
        Ok(Arc::new(DfsDriver::open(config, self.clients.clone())))
    }
}

/// Registers the HDFS driver under its canonical name.
pub fn register_hdfs<F>(registry: &mut DriverRegistry, clients: F) -> Result<(), RegistryError>
where
    F: ClientFactory + Clone,
{
    registry.register(DRIVER_NAME, Arc::new(HdfsDriverFactory::new(clients)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ParameterValue, fs::memory::MemoryFs};

    fn parameters(root: &str) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("rootdirectory".to_string(), ParameterValue::from(root));
        parameters.insert("maxClients".to_string(), ParameterValue::from("2"));
        parameters
    }

    #[tokio::test]
    async fn test_register_and_create() {
        let fs = MemoryFs::new();
        let mut registry = DriverRegistry::new();
        register_hdfs(&mut registry, fs.clone()).unwrap();
        assert_eq!(registry.names(), vec!["hdfs"]);

        let driver = registry.create("hdfs", &parameters("/registry")).unwrap();
        assert_eq!(driver.name(), "hdfs");
        driver.put_content("/blob", b"abc").await.unwrap();
        assert!(fs.exists("/registry/blob"));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut registry = DriverRegistry::new();
        register_hdfs(&mut registry, MemoryFs::new()).unwrap();

        let err = register_hdfs(&mut registry, MemoryFs::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "hdfs"));

        let err = registry
            .create("s3", &parameters("/registry"))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Unknown(name) if name == "s3"));
    }

    #[test]
    fn test_config_errors_surface() {
        let mut registry = DriverRegistry::new();
        register_hdfs(&mut registry, MemoryFs::new()).unwrap();

        let err = registry.create("hdfs", &Parameters::new()).err().unwrap();
        assert!(matches!(
            err,
            RegistryError::Driver(DriverError::Config(_))
        ));
    }
}
