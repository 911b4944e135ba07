use async_trait::async_trait;
use futures_util::AsyncWriteExt;

use super::FileWriter;
use crate::{
    error::{DriverResult, WriterError},
    fs::FsClient,
    observability::log_debug,
};

/// Write transaction over a single cluster file.
///
/// The writer owns the client it was opened with: cancelling needs it to
/// remove the partial file.
pub struct DfsFileWriter<C>
where
    C: FsClient,
{
    client: C,
    file: Option<C::Writer>,
    path: String,
    size: u64,
    closed: bool,
    committed: bool,
    cancelled: bool,
}

impl<C> DfsFileWriter<C>
where
    C: FsClient,
{
    /// `size` is the length of the file the handle continues, zero for a
    /// fresh file.
    pub(crate) fn new(client: C, path: String, file: C::Writer, size: u64) -> Self {
        DfsFileWriter {
            client,
            file: Some(file),
            path,
            size,
            closed: false,
            committed: false,
            cancelled: false,
        }
    }

    fn ensure_open(&self) -> Result<(), WriterError> {
        if self.closed {
            Err(WriterError::AlreadyClosed)
        } else if self.committed {
            Err(WriterError::AlreadyCommitted)
        } else if self.cancelled {
            Err(WriterError::AlreadyCancelled)
        } else {
            Ok(())
        }
    }

    // Only cancel releases the handle before close, and cancel sets its flag
    // first, so an open transaction always holds one.
    fn file(&mut self) -> Result<&mut C::Writer, WriterError> {
        self.file.as_mut().ok_or(WriterError::AlreadyCancelled)
    }
}

#[async_trait]
impl<C> FileWriter for DfsFileWriter<C>
where
    C: FsClient,
{
    async fn write(&mut self, buf: &[u8]) -> DriverResult<usize> {
        self.ensure_open()?;
        let written = self.file()?.write(buf).await?;
        self.size += written as u64;
        Ok(written)
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Err(WriterError::AlreadyClosed.into());
        }
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.close().await?;
        }
        self.file = None;
        self.closed = true;
        Ok(())
    }

    async fn cancel(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.cancelled = true;
        log_debug!(
            component = "writer",
            event = "upload_cancelled",
            path = %self.path,
            written = self.size,
        );

        let closed = match self.file.take() {
            Some(mut file) => file.close().await,
            None => Ok(()),
        };
        self.client.remove(&self.path).await?;
        closed?;
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.file()?.flush().await?;
        self.committed = true;
        Ok(())
    }
}
