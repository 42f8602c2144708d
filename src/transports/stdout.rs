//! Process standard output

use crate::core::transport::{ErrorHandler, Transport};
use crate::core::{LoggerError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

pub struct StdoutTransport {
    stdout: Mutex<Stdout>,
}

impl StdoutTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    fn kind(&self) -> &'static str {
        "stdout"
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(data)
            .await
            .map_err(|e| LoggerError::io_operation("writing to stdout", "write failed", e))?;
        stdout
            .flush()
            .await
            .map_err(|e| LoggerError::io_operation("writing to stdout", "flush failed", e))
    }

    /// Flushes only; the process keeps its stdout
    async fn close(&self) -> Result<()> {
        self.stdout.lock().await.flush().await?;
        Ok(())
    }

    async fn destroy(&self) {}

    fn on_error(&self, _handler: Option<ErrorHandler>) {}
}
