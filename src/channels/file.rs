//! Rotating, optionally compressing file channel
//!
//! Files are named `{namespace}_{date}.log` inside the channel's directory.
//! Rotation happens before a write that would grow the open file past the
//! size limit, and at every boundary of the configured time limit. Rotated
//! files are deleted, or gzipped into `{name}.gz` when compression is on.

use super::rotation::{compress_file, RotationPolicy};
use crate::core::channel::fatal_handler;
use crate::core::transport::closed_transport;
use crate::core::{
    Channel, ChannelCore, ChannelOptions, LoggerError, Record, Result, RotationTimer, Transport,
};
use crate::transports::FileTransport;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Default)]
pub struct FileChannelOptions {
    pub channel: ChannelOptions,
    pub policy: RotationPolicy,
}

impl FileChannelOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel(mut self, channel: ChannelOptions) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Default)]
struct FileState {
    transport: Option<Arc<FileTransport>>,
    bytes_written: u64,
    filename: String,
    /// Rendered date of the last opened file
    file_created_at: String,
}

pub struct FileChannel {
    core: ChannelCore,
    dir: PathBuf,
    namespace: String,
    policy: RotationPolicy,
    state: Mutex<FileState>,
    timer: Option<RotationTimer>,
    compressions: TaskTracker,
    cancel: CancellationToken,
    this: Weak<FileChannel>,
}

/// `n` of a trailing `(n)` in `filename`, 0 without one
fn disambiguator(filename: &str) -> u32 {
    filename
        .strip_suffix(')')
        .and_then(|head| head.rsplit_once('('))
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0)
}

impl FileChannel {
    /// Open the first file in `dir` and start the rotation timer, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for an empty level set and `IoOperation` when
    /// the directory or the file cannot be created.
    pub async fn new(
        dir: impl AsRef<Path>,
        namespace: impl Into<String>,
        options: FileChannelOptions,
    ) -> Result<Arc<Self>> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            LoggerError::io_operation(
                "opening log directory",
                format!("cannot create {}", dir.display()),
                e,
            )
        })?;

        let core = ChannelCore::new(options.channel)?;
        let timer = options.policy.file_time_limit.map(RotationTimer::with_boundary);
        let channel = Arc::new_cyclic(|this| Self {
            core,
            dir,
            namespace: namespace.into(),
            policy: options.policy,
            state: Mutex::new(FileState::default()),
            timer,
            compressions: TaskTracker::new(),
            cancel: CancellationToken::new(),
            this: this.clone(),
        });

        {
            let mut state = channel.state.lock().await;
            channel.open_file(&mut state).await?;
        }
        channel.core.activate();

        if let Some(timer) = &channel.timer {
            let this = channel.this.clone();
            timer.start(move || {
                let this = this.clone();
                async move {
                    if let Some(channel) = this.upgrade() {
                        channel.rotate_on_timer().await;
                    }
                }
            })?;
        }

        tracing::debug!(
            channel = %channel.core.id(),
            dir = %channel.dir.display(),
            namespace = %channel.namespace,
            "file channel opened"
        );
        Ok(channel)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// File name of the open file, without extension
    pub async fn filename(&self) -> String {
        self.state.lock().await.filename.clone()
    }

    /// Path of the open file; `None` once the channel closed
    pub async fn current_path(&self) -> Option<PathBuf> {
        let state = self.state.lock().await;
        state.transport.as_ref().map(|t| t.path().to_path_buf())
    }

    /// Bytes written to the open file
    pub async fn bytes_written(&self) -> u64 {
        self.state.lock().await.bytes_written
    }

    /// Compressions still running
    #[must_use]
    pub fn pending_compressions(&self) -> usize {
        self.compressions.len()
    }

    /// Rotate immediately.
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` when the channel does not accept writes, and
    /// the I/O failure of closing, deleting or opening a file.
    pub async fn rotate_now(&self) -> Result<()> {
        self.core.ensure_writable()?;
        let mut state = self.state.lock().await;
        self.rotate(&mut state).await
    }

    async fn open_file(&self, state: &mut FileState) -> Result<()> {
        let stamp = self.policy.file_date_template.render(&Utc::now());
        let filename = if self.policy.compress && stamp == state.file_created_at {
            format!(
                "{}_{}({})",
                self.namespace,
                stamp,
                disambiguator(&state.filename) + 1
            )
        } else {
            format!("{}_{}", self.namespace, stamp)
        };

        let transport = FileTransport::create(self.dir.join(format!("{}.log", filename))).await?;
        state.transport = Some(Arc::new(transport));
        state.bytes_written = 0;
        state.filename = filename;
        state.file_created_at = stamp;
        Ok(())
    }

    async fn rotate(&self, state: &mut FileState) -> Result<()> {
        self.core.set_paused(true);
        let result = self.swap_file(state).await;
        self.core.set_paused(false);
        result
    }

    async fn swap_file(&self, state: &mut FileState) -> Result<()> {
        state.bytes_written = 0;
        if let Some(previous) = state.transport.take() {
            previous.close().await?;
            let source = previous.path().to_path_buf();
            if self.policy.compress {
                let dest = self.dir.join(format!("{}.gz", state.filename));
                self.spawn_compression(source, dest);
            } else {
                tokio::fs::remove_file(&source).await.map_err(|e| {
                    LoggerError::file_rotation(
                        source.display().to_string(),
                        format!("cannot delete rotated file: {}", e),
                    )
                })?;
            }
        }
        self.open_file(state).await?;
        tracing::debug!(channel = %self.core.id(), file = %state.filename, "rotated");
        Ok(())
    }

    fn spawn_compression(&self, source: PathBuf, dest: PathBuf) {
        let cancel = self.cancel.clone();
        let this = self.this.clone();
        self.compressions.spawn(async move {
            match compress_file(source, dest, cancel).await {
                Ok(()) => {}
                Err(error) if error.is_cancellation() => {
                    tracing::debug!(error = %error, "compression cancelled");
                }
                Err(error) => {
                    if let Some(channel) = this.upgrade() {
                        channel.compression_failed(error);
                    }
                }
            }
        });
    }

    fn compression_failed(&self, error: LoggerError) {
        let error = Arc::new(error);
        if self.core.is_active() {
            let this: Weak<dyn Channel> = self.this.clone();
            fatal_handler(this)(error);
        } else {
            self.core.events().emit_error(error);
        }
    }

    async fn rotate_on_timer(&self) {
        let mut state = self.state.lock().await;
        if !self.core.is_active() {
            return;
        }
        if let Err(error) = self.rotate(&mut state).await {
            drop(state);
            let this: Weak<dyn Channel> = self.this.clone();
            fatal_handler(this)(Arc::new(error));
        }
    }

    fn stop_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.stop();
        }
    }
}

#[async_trait]
impl Channel for FileChannel {
    fn core(&self) -> &ChannelCore {
        &self.core
    }

    async fn write_record(&self, record: Record) -> Result<()> {
        let line = self.core.format(&record)?;
        let size = line.len() as u64;

        let mut state = self.state.lock().await;
        if let Some(limit) = self.policy.size_limit() {
            if size > limit {
                return Err(LoggerError::MessageTooLarge { size, limit });
            }
            if state.bytes_written + size > limit {
                self.rotate(&mut state).await?;
            }
        }

        let transport = state
            .transport
            .clone()
            .ok_or_else(|| closed_transport("file"))?;
        transport.write(line.as_bytes()).await?;
        state.bytes_written += size;
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        // a timer rotation holding the state runs to completion first
        let transport = {
            let mut state = self.state.lock().await;
            self.stop_timer();
            state.transport.take()
        };
        if let Some(transport) = transport {
            transport.close().await?;
        }
        self.compressions.close();
        self.compressions.wait().await;
        Ok(())
    }

    async fn teardown(&self, _error: Option<&LoggerError>) {
        let transport = {
            let mut state = self.state.lock().await;
            self.stop_timer();
            state.transport.take()
        };
        if let Some(transport) = transport {
            transport.destroy().await;
        }
        self.cancel.cancel();
        self.compressions.close();
        self.compressions.wait().await;
    }
}
