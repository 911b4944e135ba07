//! HDFS storage driver for container-image registries.
//!
//! The driver maps the registry's storage-driver contract (content get/put,
//! streaming reads, write transactions, stat, list, move, delete and walk)
//! onto a distributed filesystem cluster. The cluster client itself sits
//! behind [`fs::FsClient`]; [`fs::local::LocalFs`] serves a mounted namespace
//! and [`fs::memory::MemoryFs`] an in-process one.
//!
//! ```ignore
//! let config = DriverConfig::new("namenode:8020", "/registry", 64)?;
//! let driver = DfsDriver::open(config, LocalFsFactory::new("/mnt/hdfs"));
//! driver.put_content("/docker/registry/v2/blobs/data", b"layer").await?;
//! ```

pub mod config;

/// Storage-driver contract, the HDFS adapter and its concurrency regulator.
pub mod driver;

pub mod error;

/// Cluster client capability and the bundled clients.
pub mod fs;

mod observability;

pub mod registry;

pub use crate::{
    config::{DriverConfig, ParameterValue, Parameters, DEFAULT_MAX_CLIENTS},
    driver::{
        dfs::{DfsDriver, Driver, DRIVER_NAME},
        regulator::Regulator,
        walk_fallback, FileInfo, FileWriter, ReadStream, StorageDriver, WalkControl, WalkFn,
    },
    error::{DriverError, DriverResult, WriterError},
    registry::{register_hdfs, DriverFactory, DriverRegistry, HdfsDriverFactory, RegistryError},
};
