//! Structured log events emitted by the driver.
//!
//! Events go out through `tracing` under the `hdfs_driver` target. Each one
//! names the part of the driver that raised it (`component`: `config`,
//! `driver` or `writer`) and what happened (`event`, in snake_case), so a
//! registry can filter driver noise without parsing messages. Installing a
//! subscriber is left to the embedding process.
//!
//! Lifecycle points are logged: driver creation, client connections, writer
//! opening and cancellation, a cleanup that failed after another error.
//! Ordinary operation failures travel back to the caller as
//! [`DriverError`](crate::error::DriverError) and are not logged twice.

pub(crate) const DRIVER_TARGET: &str = "hdfs_driver";

/// `info` event under [`DRIVER_TARGET`], e.g.
/// `log_info!(component = "driver", event = "driver_created", root = %root)`.
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::DRIVER_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::DRIVER_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::DRIVER_TARGET, $($field)*)
    };
}

macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::DRIVER_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
