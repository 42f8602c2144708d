//! Transport capability consumed by channels

use super::error::{LoggerError, Result};
use crate::transports::WorkerLink;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback receiving asynchronous transport failures
pub type ErrorHandler = Arc<dyn Fn(Arc<LoggerError>) + Send + Sync>;

/// Byte sink (and, for links, source) a channel writes through.
///
/// Failures of a `write` are returned to the caller. Failures that happen
/// outside of a call, such as a broken inbound link, are reported through
/// the handler registered with [`Transport::on_error`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in diagnostics
    fn kind(&self) -> &'static str;

    /// Write one rendered chunk; resolves once the sink acknowledged it
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Flush and release the sink
    async fn close(&self) -> Result<()>;

    /// Release the sink immediately, dropping unflushed data
    async fn destroy(&self);

    /// Replace the error listener; `None` detaches it
    fn on_error(&self, handler: Option<ErrorHandler>);

    fn as_worker_link(&self) -> Option<&WorkerLink> {
        None
    }
}

/// Error returned by writes to a released transport
pub(crate) fn closed_transport(kind: &str) -> LoggerError {
    LoggerError::io_operation(
        format!("writing to {}", kind),
        "transport is closed",
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "transport is closed"),
    )
}
