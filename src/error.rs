use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type shared across driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced across the storage-driver boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The logical path does not exist on the cluster.
    #[error("path not found: {path}")]
    PathNotFound { path: String },
    /// The requested read offset lies past the end of the object.
    #[error("invalid offset: {offset} for path: {path}")]
    InvalidOffset { path: String, offset: u64 },
    /// The operation is categorically unavailable on this driver.
    #[error("{driver}: unsupported method")]
    Unsupported { driver: &'static str },
    /// A write transaction was used outside of its valid state.
    #[error("file writer error: {0}")]
    Writer(#[from] WriterError),
    /// The driver could not be constructed from its parameters.
    #[error("driver config error: {0}")]
    Config(#[from] ConfigError),
    /// Anything else reported by the filesystem client.
    #[error("driver io error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        DriverError::PathNotFound { path: path.into() }
    }

    /// Whether this error reports an absent path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::PathNotFound { .. })
    }
}

/// State violations of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriterError {
    #[error("already closed")]
    AlreadyClosed,
    #[error("already committed")]
    AlreadyCommitted,
    #[error("already cancelled")]
    AlreadyCancelled,
}
