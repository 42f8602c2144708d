//! Parent/worker process link
//!
//! Messages are JSON values, one per line, over any byte stream pair: a
//! spawned child's stdio on the parent side, this process' stdio on the
//! worker side, or an in-memory duplex for tests.

use crate::core::transport::{closed_transport, ErrorHandler, Transport};
use crate::core::{Level, LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Command tag of envelopes carrying a rendered record
pub const WRITE_COMMAND: &str = "WRITE";

const DUPLEX_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// The supervising process
    Parent,
    /// A process supervised by a parent
    Worker,
}

/// Rendered record travelling over a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    pub level: String,
    pub data: String,
}

impl Envelope {
    pub fn write(level: Level, data: impl Into<String>) -> Self {
        Self {
            command: WRITE_COMMAND.to_string(),
            level: level.name().to_string(),
            data: data.into(),
        }
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.command == WRITE_COMMAND
    }
}

/// Listener for inbound messages
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    message: Mutex<Option<MessageHandler>>,
    error: Mutex<Option<ErrorHandler>>,
}

impl Listeners {
    fn dispatch(&self, message: Value) {
        let handler = self.message.lock().clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    fn raise(&self, error: Arc<LoggerError>) {
        let handler = self.error.lock().clone();
        match handler {
            Some(handler) => handler(error),
            None => tracing::warn!(error = %error, "worker link error without listener"),
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct WorkerLink {
    role: LinkRole,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    listeners: Arc<Listeners>,
    reader: Mutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
}

impl WorkerLink {
    /// Link over an arbitrary stream pair; starts reading immediately
    pub fn new<R, W>(role: LinkRole, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let listeners = Arc::new(Listeners::default());
        let task = tokio::spawn(read_messages(reader, listeners.clone()));
        Self {
            role,
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            listeners,
            reader: Mutex::new(Some(task)),
            child: Mutex::new(None),
        }
    }

    /// Spawn `command` as a worker and link to its stdin/stdout
    pub fn spawn(command: &mut Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| LoggerError::io_operation("spawning worker", "spawn failed", e))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LoggerError::other("worker stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LoggerError::other("worker stdout is not piped"))?;

        let link = Self::new(LinkRole::Parent, stdout, stdin);
        *link.child.lock() = Some(child);
        Ok(link)
    }

    /// Worker side of a link whose parent owns this process' stdio
    #[must_use]
    pub fn current_process() -> Self {
        Self::new(LinkRole::Worker, tokio::io::stdin(), tokio::io::stdout())
    }

    /// Connected in-memory `(parent, worker)` pair
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (parent_end, worker_end) = tokio::io::duplex(DUPLEX_BUFFER);
        let (parent_read, parent_write) = tokio::io::split(parent_end);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        (
            Self::new(LinkRole::Parent, parent_read, parent_write),
            Self::new(LinkRole::Worker, worker_read, worker_write),
        )
    }

    #[must_use]
    pub fn role(&self) -> LinkRole {
        self.role
    }

    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.role == LinkRole::Worker
    }

    /// Replace the inbound message listener; `None` detaches it
    pub fn on_message(&self, handler: Option<MessageHandler>) {
        *self.listeners.message.lock() = handler;
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        self.send_value(&serde_json::to_value(envelope)?).await
    }

    pub async fn send_value(&self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.send_raw(&line).await
    }

    async fn send_raw(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| closed_transport("worker link"))?;
        writer
            .write_all(data)
            .await
            .map_err(|e| LoggerError::io_operation("sending over worker link", "write failed", e))?;
        writer
            .flush()
            .await
            .map_err(|e| LoggerError::io_operation("sending over worker link", "flush failed", e))
    }
}

async fn read_messages<R>(reader: R, listeners: Arc<Listeners>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                Ok(message) => listeners.dispatch(message),
                Err(e) => tracing::debug!(error = %e, "ignoring malformed link message"),
            },
            Ok(None) => break,
            Err(e) => {
                listeners.raise(Arc::new(LoggerError::io_operation(
                    "reading worker link",
                    "read failed",
                    e,
                )));
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for WorkerLink {
    fn kind(&self) -> &'static str {
        "worker link"
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        self.send_raw(data).await
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    async fn destroy(&self) {
        self.writer.lock().await.take();
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "worker already exited");
            }
        }
    }

    fn on_error(&self, handler: Option<ErrorHandler>) {
        *self.listeners.error.lock() = handler;
    }

    fn as_worker_link(&self) -> Option<&WorkerLink> {
        Some(self)
    }
}

impl Drop for WorkerLink {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}
