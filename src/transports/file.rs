//! Plain file transport

use crate::core::transport::{closed_transport, ErrorHandler, Transport};
use crate::core::{LoggerError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct FileTransport {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileTransport {
    /// Create (or truncate) the file at `path`
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await.map_err(|e| {
            LoggerError::io_operation(
                "opening log file",
                format!("cannot create {}", path.display()),
                e,
            )
        })?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(|| closed_transport(self.kind()))?;
        file.write_all(data).await.map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("cannot write to {}", self.path.display()),
                e,
            )
        })?;
        file.flush().await.map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("cannot flush {}", self.path.display()),
                e,
            )
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
            file.sync_all().await.map_err(|e| {
                LoggerError::io_operation(
                    "closing log file",
                    format!("cannot sync {}", self.path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    async fn destroy(&self) {
        self.file.lock().await.take();
    }

    fn on_error(&self, _handler: Option<ErrorHandler>) {}
}
