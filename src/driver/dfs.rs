use std::io::SeekFrom;

use async_trait::async_trait;
use futures_util::{AsyncReadExt, AsyncSeekExt};

use super::{
    regulator::Regulator, walk_fallback, writer::DfsFileWriter, FileInfo, FileWriter, ReadStream,
    StorageDriver, WalkFn,
};
use crate::{
    config::{DriverConfig, Parameters},
    error::{DriverError, DriverResult},
    fs::{is_not_found, path, ClientFactory, FsClient, FsMetadata},
    observability::{log_debug, log_error, log_info},
};

/// Name the driver registers under.
pub const DRIVER_NAME: &str = "hdfs";

/// The HDFS driver as handed to a registry: the adapter behind a
/// [`Regulator`] sized by `maxClients`.
pub type Driver<F> = Regulator<DfsDriver<F>>;

/// Storage driver that keeps every object below a root directory on the
/// cluster.
///
/// Each operation connects a fresh client through the factory; nothing is
/// pooled between operations.
pub struct DfsDriver<F> {
    config: DriverConfig,
    factory: F,
}

impl<F> DfsDriver<F>
where
    F: ClientFactory,
{
    pub fn new(config: DriverConfig, factory: F) -> Self {
        DfsDriver { config, factory }
    }

    /// Builds the regulated driver for `config`.
    pub fn open(config: DriverConfig, factory: F) -> Driver<F> {
        log_info!(
            component = "driver",
            event = "driver_created",
            namenode = %config.namenode(),
            root = %config.root_path(),
            max_clients = config.max_clients(),
        );
        let max_clients = config.max_clients();
        Regulator::new(DfsDriver::new(config, factory), max_clients)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Resolves a logical path beneath the root. The logical path is cleaned
    /// as a rooted path first, so `..` never climbs above the root.
    fn full_path(&self, sub_path: &str) -> String {
        path::join(
            self.config.root_path(),
            &path::clean(&format!("/{sub_path}")),
        )
    }

    async fn client(&self) -> DriverResult<F::Client> {
        let client = self.factory.connect(self.config.namenode()).await?;
        log_debug!(
            component = "driver",
            event = "client_connected",
            namenode = %self.config.namenode(),
        );
        Ok(client)
    }

    /// Stat that reports an absent path under its logical name.
    async fn stat_existing(
        &self,
        client: &F::Client,
        full_path: &str,
        sub_path: &str,
    ) -> DriverResult<FsMetadata> {
        client.stat(full_path).await.map_err(|err| {
            if is_not_found(&err) {
                DriverError::not_found(sub_path)
            } else {
                err.into()
            }
        })
    }

    async fn open_writer(
        &self,
        full_path: &str,
        sub_path: &str,
        append: bool,
    ) -> DriverResult<DfsFileWriter<F::Client>> {
        let client = self.client().await?;
        client.mkdir_all(&path::parent(full_path)).await?;

        let existing = match client.stat(full_path).await {
            Ok(metadata) => Some(metadata),
            Err(err) if is_not_found(&err) => None,
            Err(err) => return Err(err.into()),
        };

        let (file, size) = match existing {
            Some(metadata) if metadata.is_dir => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{full_path} is a directory"),
                )
                .into());
            }
            Some(metadata) if append => (client.append(full_path).await?, metadata.size),
            Some(_) => {
                // The cluster cannot truncate in place: drop the old file and
                // start a new one.
                client.remove(full_path).await?;
                (client.create(full_path).await?, 0)
            }
            // Appending resumes an upload; a vanished one is an error.
            None if append => return Err(DriverError::not_found(sub_path)),
            None => (client.create(full_path).await?, 0),
        };

        log_debug!(
            component = "writer",
            event = "writer_opened",
            path = %full_path,
            append,
            size,
        );
        Ok(DfsFileWriter::new(client, full_path.to_string(), file, size))
    }
}

#[async_trait]
impl<F> StorageDriver for DfsDriver<F>
where
    F: ClientFactory,
{
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    async fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
        let mut reader = self.reader(path, 0).await?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await?;
        Ok(content)
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
        let mut writer = self.writer(path, false).await?;

        // A failed commit leaves the transaction open, so both failures
        // cancel and drop the partial file.
        let mut outcome = writer.write_all(content).await;
        if outcome.is_ok() {
            outcome = writer.commit().await;
        }
        if outcome.is_err() {
            if let Err(cancel_err) = writer.cancel().await {
                log_error!(
                    component = "driver",
                    event = "put_content_cancel_failed",
                    path = %path,
                    error = %cancel_err,
                );
            }
        }
        let closed = writer.close().await;
        outcome?;
        closed
    }

    async fn reader(&self, path: &str, offset: u64) -> DriverResult<ReadStream> {
        let client = self.client().await?;
        let full_path = self.full_path(path);

        let mut file = client.open_read(&full_path).await.map_err(|err| {
            if is_not_found(&err) {
                DriverError::not_found(path)
            } else {
                err.into()
            }
        })?;

        let len = file.seek(SeekFrom::End(0)).await?;
        if offset > len {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::new(file))
    }

    async fn writer(&self, path: &str, append: bool) -> DriverResult<Box<dyn FileWriter>> {
        let full_path = self.full_path(path);
        match self.open_writer(&full_path, path, append).await {
            Ok(writer) => Ok(Box::new(writer)),
            Err(err) => {
                log_error!(
                    component = "writer",
                    event = "writer_open_failed",
                    path = %full_path,
                    append,
                    error = %err,
                );
                Err(err)
            }
        }
    }

    async fn stat(&self, path: &str) -> DriverResult<FileInfo> {
        let client = self.client().await?;
        let metadata = self
            .stat_existing(&client, &self.full_path(path), path)
            .await?;
        Ok(FileInfo {
            path: path.to_string(),
            is_dir: metadata.is_dir,
            size: metadata.size,
            modified: metadata.modified,
        })
    }

    async fn list(&self, path: &str) -> DriverResult<Vec<String>> {
        let client = self.client().await?;
        let names = client
            .read_dir(&self.full_path(path))
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    DriverError::not_found(path)
                } else {
                    err.into()
                }
            })?;

        let mut keys: Vec<String> = names
            .iter()
            .map(|name| path::join(path, name))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn move_object(&self, source: &str, dest: &str) -> DriverResult<()> {
        let client = self.client().await?;
        let (source_path, dest_path) = (self.full_path(source), self.full_path(dest));

        self.stat_existing(&client, &source_path, source).await?;
        client.mkdir_all(&path::parent(&dest_path)).await?;
        client.rename(&source_path, &dest_path).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> DriverResult<()> {
        let client = self.client().await?;
        let full_path = self.full_path(path);

        self.stat_existing(&client, &full_path, path).await?;
        client.remove(&full_path).await?;
        Ok(())
    }

    async fn url_for(&self, _path: &str, _options: &Parameters) -> DriverResult<String> {
        Err(DriverError::Unsupported {
            driver: DRIVER_NAME,
        })
    }

    async fn walk(&self, path: &str, visitor: &mut WalkFn<'_>) -> DriverResult<()> {
        walk_fallback(self, path, visitor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryFs;

    fn driver(fs: &MemoryFs) -> DfsDriver<MemoryFs> {
        let config = DriverConfig::new("nn:8020", "/registry", 4).unwrap();
        DfsDriver::new(config, fs.clone())
    }

    #[tokio::test]
    async fn test_paths_resolve_below_root() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);

        driver.put_content("/docker/blob", b"data").await.unwrap();
        assert!(fs.exists("/registry/docker/blob"));
        assert_eq!(driver.full_path("/"), "/registry");
        assert_eq!(driver.full_path("a/b"), "/registry/a/b");
    }

    #[tokio::test]
    async fn test_parent_segments_stay_below_root() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);
        assert_eq!(driver.full_path("/../x"), "/registry/x");
        assert_eq!(driver.full_path("/a/../../.."), "/registry");
        assert_eq!(driver.full_path("/.."), "/registry");

        fs.mkdir_all("/keep").await.unwrap();
        driver.put_content("/../outside", b"data").await.unwrap();
        assert!(fs.exists("/registry/outside"));
        assert!(!fs.exists("/outside"));

        driver.delete("/..").await.unwrap();
        assert!(!fs.exists("/registry"));
        assert!(fs.exists("/keep"));
    }

    #[tokio::test]
    async fn test_one_connection_per_operation() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);

        driver.put_content("/a", b"1").await.unwrap();
        let after_put = fs.connections();
        assert_eq!(after_put, 1);

        driver.stat("/a").await.unwrap();
        driver.list("/").await.unwrap();
        driver.get_content("/a").await.unwrap();
        assert_eq!(fs.connections(), after_put + 3);
    }

    #[tokio::test]
    async fn test_writer_refuses_directory() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);
        driver.put_content("/dir/blob", b"x").await.unwrap();

        let err = driver.writer("/dir", false).await.err().unwrap();
        assert!(matches!(err, DriverError::Io(_)));
        assert!(fs.exists("/registry/dir/blob"));
    }

    #[tokio::test]
    async fn test_failed_put_is_cancelled() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);
        fs.set_space_quota(Some(3));

        let err = driver.put_content("/blob", b"too large").await.unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
        assert!(!fs.exists("/registry/blob"));

        fs.set_space_quota(None);
        let err = driver.stat("/blob").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_commit_is_cancelled() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);
        fs.set_flush_failure(true);

        let err = driver.put_content("/blob", b"payload").await.unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
        assert!(!fs.exists("/registry/blob"));

        fs.set_flush_failure(false);
        assert!(driver.stat("/blob").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_append_requires_existing_object() {
        let fs = MemoryFs::new();
        let driver = driver(&fs);

        let err = driver.writer("/uploads/lost", true).await.err().unwrap();
        assert!(matches!(err, DriverError::PathNotFound { ref path } if path == "/uploads/lost"));
        assert!(!fs.exists("/registry/uploads/lost"));
    }

    #[tokio::test]
    async fn test_url_for_is_unsupported() {
        let fs = MemoryFs::new();
        let err = driver(&fs)
            .url_for("/blob", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Unsupported { driver: "hdfs" }));
    }
}
