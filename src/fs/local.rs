use std::{
    io,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use tokio::fs::{self, File, OpenOptions};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

use super::{path, ClientFactory, FsClient, FsMetadata};

/// Client for a cluster namespace exposed as a local directory tree, such as
/// a FUSE or NFS mount of the cluster.
#[derive(Debug, Clone)]
pub struct LocalFs {
    mount: PathBuf,
}

impl LocalFs {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        LocalFs {
            mount: mount.into(),
        }
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Cluster path `/a/b` lives at `<mount>/a/b`; `..` never leaves the mount.
    fn local_path(&self, cluster_path: &str) -> PathBuf {
        let cleaned = path::clean(&format!("/{cluster_path}"));
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            self.mount.clone()
        } else {
            self.mount.join(relative)
        }
    }
}

impl FsClient for LocalFs {
    type Reader = Compat<File>;

    type Writer = Compat<File>;

    async fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        let file = File::open(self.local_path(path)).await?;
        if file.metadata().await?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} is a directory"),
            ));
        }
        Ok(file.compat())
    }

    async fn create(&self, path: &str) -> io::Result<Self::Writer> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.local_path(path))
            .await
            .map(TokioAsyncWriteCompatExt::compat_write)
    }

    async fn append(&self, path: &str) -> io::Result<Self::Writer> {
        OpenOptions::new()
            .append(true)
            .open(self.local_path(path))
            .await
            .map(TokioAsyncWriteCompatExt::compat_write)
    }

    async fn stat(&self, path: &str) -> io::Result<FsMetadata> {
        let metadata = fs::metadata(self.local_path(path)).await?;
        let is_dir = metadata.is_dir();
        Ok(FsMetadata {
            size: if is_dir { 0 } else { metadata.len() },
            is_dir,
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        })
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        let local = self.local_path(path);
        if fs::symlink_metadata(&local).await?.is_dir() {
            fs::remove_dir_all(local).await
        } else {
            fs::remove_file(local).await
        }
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.local_path(from), self.local_path(to)).await
    }

    async fn mkdir_all(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.local_path(path)).await
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut entries = fs::read_dir(self.local_path(path)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().into_string().map_err(|name| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non utf-8 file name: {name:?}"),
                )
            })?;
            names.push(name);
        }
        Ok(names)
    }
}

/// Hands out [`LocalFs`] clients rooted at one mount point. The namenode is
/// implied by the mount and ignored.
#[derive(Debug, Clone)]
pub struct LocalFsFactory {
    mount: PathBuf,
}

impl LocalFsFactory {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        LocalFsFactory {
            mount: mount.into(),
        }
    }
}

impl ClientFactory for LocalFsFactory {
    type Client = LocalFs;

    async fn connect(&self, _namenode: &str) -> io::Result<Self::Client> {
        if !fs::metadata(&self.mount).await?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mount point {} is not a directory", self.mount.display()),
            ));
        }
        Ok(LocalFs::new(self.mount.clone()))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{AsyncReadExt, AsyncWriteExt};
    use tempfile::TempDir;

    use super::*;

    async fn client() -> (TempDir, LocalFs) {
        let temp = TempDir::new().unwrap();
        let client = LocalFsFactory::new(temp.path()).connect("").await.unwrap();
        (temp, client)
    }

    #[test]
    fn test_local_path_stays_under_mount() {
        let fs = LocalFs::new("/mnt/cluster");
        assert_eq!(fs.local_path("/a/b"), PathBuf::from("/mnt/cluster/a/b"));
        assert_eq!(fs.local_path("/../../etc"), PathBuf::from("/mnt/cluster/etc"));
        assert_eq!(fs.local_path("/"), PathBuf::from("/mnt/cluster"));
    }

    #[tokio::test]
    async fn test_create_append_read() {
        let (_temp, fs) = client().await;
        fs.mkdir_all("/registry/blobs").await.unwrap();

        let mut writer = fs.create("/registry/blobs/data").await.unwrap();
        writer.write_all(b"hello").await.unwrap();
        writer.close().await.unwrap();

        let err = fs.create("/registry/blobs/data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let mut writer = fs.append("/registry/blobs/data").await.unwrap();
        writer.write_all(b" world").await.unwrap();
        writer.close().await.unwrap();

        let mut buf = Vec::new();
        let mut reader = fs.open_read("/registry/blobs/data").await.unwrap();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");

        let meta = fs.stat("/registry/blobs/data").await.unwrap();
        assert_eq!(meta.size, 11);
        assert!(!meta.is_dir);
        assert!(fs.stat("/registry").await.unwrap().is_dir);
    }

    #[tokio::test]
    async fn test_missing_paths() {
        let (_temp, fs) = client().await;

        for err in [
            fs.open_read("/missing").await.map(|_| ()).unwrap_err(),
            fs.append("/missing").await.map(|_| ()).unwrap_err(),
            fs.stat("/missing").await.map(|_| ()).unwrap_err(),
            fs.remove("/missing").await.unwrap_err(),
            fs.read_dir("/missing").await.map(|_| ()).unwrap_err(),
        ] {
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn test_remove_is_recursive_and_rename() {
        let (_temp, fs) = client().await;
        fs.mkdir_all("/a/b/c").await.unwrap();
        fs.create("/a/b/c/file").await.unwrap().close().await.unwrap();

        let mut names = fs.read_dir("/a/b").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["c".to_string()]);

        fs.mkdir_all("/moved").await.unwrap();
        fs.rename("/a/b/c/file", "/moved/file").await.unwrap();
        assert!(fs.stat("/moved/file").await.is_ok());

        fs.remove("/a").await.unwrap();
        assert_eq!(
            fs.stat("/a/b").await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_connect_requires_mount() {
        let temp = TempDir::new().unwrap();
        let err = LocalFsFactory::new(temp.path().join("nope"))
            .connect("")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
