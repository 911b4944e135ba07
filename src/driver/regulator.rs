use async_lock::Semaphore;
use async_trait::async_trait;

use super::{FileInfo, FileWriter, ReadStream, StorageDriver, WalkFn};
use crate::{config::Parameters, error::DriverResult};

/// Bounds the number of operations in flight against the wrapped driver.
///
/// Every call waits for one of `capacity` slots and gives it back once the
/// call returns, whether it succeeded, failed or was dropped. Streams and
/// writers handed out by `reader` and `writer` do not keep their slot.
pub struct Regulator<D> {
    driver: D,
    slots: Semaphore,
    capacity: usize,
}

impl<D> Regulator<D>
where
    D: StorageDriver,
{
    /// A capacity of zero is raised to one.
    pub fn new(driver: D, capacity: u64) -> Self {
        let capacity = usize::try_from(capacity).unwrap_or(usize::MAX).max(1);
        Regulator {
            driver,
            slots: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn inner(&self) -> &D {
        &self.driver
    }
}

#[async_trait]
impl<D> StorageDriver for Regulator<D>
where
    D: StorageDriver,
{
    fn name(&self) -> &'static str {
        self.driver.name()
    }

    async fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
        let _slot = self.slots.acquire().await;
        self.driver.get_content(path).await
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
        let _slot = self.slots.acquire().await;
        self.driver.put_content(path, content).await
    }

    async fn reader(&self, path: &str, offset: u64) -> DriverResult<ReadStream> {
        let _slot = self.slots.acquire().await;
        self.driver.reader(path, offset).await
    }

    async fn writer(&self, path: &str, append: bool) -> DriverResult<Box<dyn FileWriter>> {
        let _slot = self.slots.acquire().await;
        self.driver.writer(path, append).await
    }

    async fn stat(&self, path: &str) -> DriverResult<FileInfo> {
        let _slot = self.slots.acquire().await;
        self.driver.stat(path).await
    }

    async fn list(&self, path: &str) -> DriverResult<Vec<String>> {
        let _slot = self.slots.acquire().await;
        self.driver.list(path).await
    }

    async fn move_object(&self, source: &str, dest: &str) -> DriverResult<()> {
        let _slot = self.slots.acquire().await;
        self.driver.move_object(source, dest).await
    }

    async fn delete(&self, path: &str) -> DriverResult<()> {
        let _slot = self.slots.acquire().await;
        self.driver.delete(path).await
    }

    async fn url_for(&self, path: &str, options: &Parameters) -> DriverResult<String> {
        let _slot = self.slots.acquire().await;
        self.driver.url_for(path, options).await
    }

    // One slot covers the whole walk; the inner driver lists and stats
    // without re-entering the regulator.
    async fn walk(&self, path: &str, visitor: &mut WalkFn<'_>) -> DriverResult<()> {
        let _slot = self.slots.acquire().await;
        self.driver.walk(path, visitor).await
    }
}
