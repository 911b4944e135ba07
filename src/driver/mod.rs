//! The storage-driver contract a registry programs against, and the HDFS
//! implementation of it.

pub mod dfs;
pub mod regulator;
pub mod writer;

use std::time::SystemTime;

use async_trait::async_trait;
use futures_io::AsyncRead;

use crate::{
    config::Parameters,
    error::{DriverError, DriverResult},
};

/// Byte stream returned by [`StorageDriver::reader`].
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Visitor invoked by [`StorageDriver::walk`] for every path below the root.
pub type WalkFn<'a> = dyn FnMut(&FileInfo) -> DriverResult<WalkControl> + Send + 'a;

/// What a walk does after visiting a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into the visited directory. Ignored for files.
    SkipDir,
}

/// Snapshot of one path's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Logical path, as given by the caller.
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes, zero for directories.
    pub size: u64,
    pub modified: SystemTime,
}

/// Hierarchical blob storage as seen by the registry.
///
/// Paths are slash separated logical paths; drivers resolve them below their
/// own root.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Content stored at `path`.
    async fn get_content(&self, path: &str) -> DriverResult<Vec<u8>>;

    /// Replaces whatever is stored at `path` with `content`.
    async fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()>;

    /// Stream of the content at `path`, starting `offset` bytes in.
    async fn reader(&self, path: &str, offset: u64) -> DriverResult<ReadStream>;

    /// Opens a write transaction for `path`, continuing the existing content
    /// when `append` is set.
    async fn writer(&self, path: &str, append: bool) -> DriverResult<Box<dyn FileWriter>>;

    async fn stat(&self, path: &str) -> DriverResult<FileInfo>;

    /// Logical paths of the immediate children of `path`, in lexical order.
    async fn list(&self, path: &str) -> DriverResult<Vec<String>>;

    /// Moves the object at `source` to `dest`, creating the parents of `dest`.
    async fn move_object(&self, source: &str, dest: &str) -> DriverResult<()>;

    /// Recursively deletes `path`.
    async fn delete(&self, path: &str) -> DriverResult<()>;

    /// A URL the content may be fetched from directly.
    async fn url_for(&self, path: &str, options: &Parameters) -> DriverResult<String>;

    async fn walk(&self, path: &str, visitor: &mut WalkFn<'_>) -> DriverResult<()>;
}

/// One upload in progress.
///
/// Exactly one of [`commit`](FileWriter::commit) and
/// [`cancel`](FileWriter::cancel) can succeed. [`close`](FileWriter::close)
/// releases the transport handle and may follow either of them, or end the
/// upload on its own, leaving the written bytes in place.
#[async_trait]
pub trait FileWriter: Send {
    /// Appends `buf`, returning how many bytes the cluster accepted.
    async fn write(&mut self, buf: &[u8]) -> DriverResult<usize>;

    /// Total size of the object, including content present before an append.
    fn size(&self) -> u64;

    async fn close(&mut self) -> DriverResult<()>;

    /// Discards the upload and removes everything written so far.
    async fn cancel(&mut self) -> DriverResult<()>;

    /// Flushes the upload, marking it durable.
    async fn commit(&mut self) -> DriverResult<()>;

    async fn write_all(&mut self, mut buf: &[u8]) -> DriverResult<()> {
        while !buf.is_empty() {
            match self.write(buf).await? {
                0 => {
                    return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// Depth-first walk built on [`StorageDriver::list`] and
/// [`StorageDriver::stat`], for drivers without a native recursive listing.
///
/// Children are visited in lexical order. Paths that disappear between being
/// listed and being visited are skipped.
pub async fn walk_fallback<D>(driver: &D, from: &str, visitor: &mut WalkFn<'_>) -> DriverResult<()>
where
    D: StorageDriver + ?Sized,
{
    let mut pending = vec![sorted_children(driver, from).await?.into_iter()];

    while let Some(children) = pending.last_mut() {
        let Some(child) = children.next() else {
            pending.pop();
            continue;
        };

        let info = match driver.stat(&child).await {
            Ok(info) => info,
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err),
        };
        let control = visitor(&info)?;

        if info.is_dir && control == WalkControl::Continue {
            match sorted_children(driver, &child).await {
                Ok(grandchildren) => pending.push(grandchildren.into_iter()),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

async fn sorted_children<D>(driver: &D, path: &str) -> Result<Vec<String>, DriverError>
where
    D: StorageDriver + ?Sized,
{
    let mut children = driver.list(path).await?;
    children.sort();
    Ok(children)
}
