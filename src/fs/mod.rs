//! Remote filesystem capability used by the driver.
//!
//! The cluster's wire protocol lives behind [`FsClient`]; the driver only
//! needs the handful of namespace and stream operations below. A
//! [`ClientFactory`] hands out one client per logical driver operation.

#[cfg(feature = "tokio")]
pub mod local;
pub mod memory;
pub mod path;

use std::{future::Future, io, time::SystemTime};

use futures_io::{AsyncRead, AsyncSeek, AsyncWrite};

/// Metadata reported by the cluster for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub modified: SystemTime,
}

/// Operations the driver requires from a cluster client.
///
/// Paths are absolute, slash separated cluster paths. An absent path is
/// reported as [`io::ErrorKind::NotFound`], an existing one on exclusive
/// creation as [`io::ErrorKind::AlreadyExists`].
pub trait FsClient: Send + Sync + 'static {
    type Reader: AsyncRead + AsyncSeek + Unpin + Send + 'static;

    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Opens an existing file for reading from its start.
    fn open_read(&self, path: &str) -> impl Future<Output = io::Result<Self::Reader>> + Send;

    /// Creates a new file, failing if one already exists.
    fn create(&self, path: &str) -> impl Future<Output = io::Result<Self::Writer>> + Send;

    /// Opens an existing file positioned at its end.
    fn append(&self, path: &str) -> impl Future<Output = io::Result<Self::Writer>> + Send;

    fn stat(&self, path: &str) -> impl Future<Output = io::Result<FsMetadata>> + Send;

    /// Removes a file, or a directory together with everything below it.
    fn remove(&self, path: &str) -> impl Future<Output = io::Result<()>> + Send;

    /// Renames `from` to `to`, replacing a file already at `to`.
    fn rename(&self, from: &str, to: &str) -> impl Future<Output = io::Result<()>> + Send;

    fn mkdir_all(&self, path: &str) -> impl Future<Output = io::Result<()>> + Send;

    /// Names of the immediate children of a directory.
    fn read_dir(&self, path: &str) -> impl Future<Output = io::Result<Vec<String>>> + Send;
}

/// Establishes client connections to a cluster.
///
/// No pooling is implied: the driver connects once per logical operation.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: FsClient;

    /// Connects to `namenode`; an empty address means the client's ambient
    /// configuration decides which cluster to talk to.
    fn connect(&self, namenode: &str) -> impl Future<Output = io::Result<Self::Client>> + Send;
}

pub(crate) fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}
