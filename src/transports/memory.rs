//! In-memory transport, for capturing output and injecting failures

use crate::core::transport::{closed_transport, ErrorHandler, Transport};
use crate::core::{LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct MemoryTransport {
    buffer: Mutex<Vec<u8>>,
    failure: Mutex<Option<String>>,
    on_error: Mutex<Option<ErrorHandler>>,
    closed: AtomicBool,
    destroyed: AtomicBool,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with `message`.
    ///
    /// The failure is returned to the writer and raised on the error signal.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Raise `message` on the error signal without a write
    pub fn raise(&self, message: impl Into<String>) {
        let error = Self::failure_error(&message.into());
        self.notify(Arc::new(error));
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    #[must_use]
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_error_listener(&self) -> bool {
        self.on_error.lock().is_some()
    }

    fn failure_error(message: &str) -> LoggerError {
        LoggerError::io_operation(
            "writing to memory transport",
            message.to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, message.to_string()),
        )
    }

    fn notify(&self, error: Arc<LoggerError>) {
        let handler = self.on_error.lock().clone();
        match handler {
            Some(handler) => handler(error),
            None => tracing::debug!(error = %error, "memory transport error without listener"),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() || self.is_destroyed() {
            return Err(closed_transport(self.kind()));
        }
        let failure = self.failure.lock().clone();
        if let Some(message) = failure {
            self.notify(Arc::new(Self::failure_error(&message)));
            return Err(Self::failure_error(&message));
        }
        self.buffer.lock().extend_from_slice(data);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    fn on_error(&self, handler: Option<ErrorHandler>) {
        *self.on_error.lock() = handler;
    }
}
