//! Rotation policy and compression of rotated-out files

use crate::core::size::ByteSize;
use crate::core::timer::TimeBoundary;
use crate::core::timestamp::DateTemplate;
use crate::core::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 64 * 1024;

/// When and how a file channel rotates
///
/// # Examples
///
/// ```
/// use rust_channel_logger::channels::RotationPolicy;
/// use rust_channel_logger::core::TimeBoundary;
///
/// // Rotate at 10 MiB or at every hour, keeping gzip archives
/// let policy = RotationPolicy::new()
///     .with_size_limit(10u64 * 1024 * 1024)
///     .with_time_limit(TimeBoundary::Hour)
///     .with_compression(true);
///
/// assert_eq!(policy.size_limit(), Some(10 * 1024 * 1024));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Gzip rotated-out files instead of deleting them
    pub compress: bool,
    /// Rotate before a write would grow the file past this size
    #[serde(alias = "fileSizeLimit")]
    pub file_size_limit: Option<ByteSize>,
    /// Rotate at every boundary of this calendar unit
    #[serde(alias = "fileTimeLimit")]
    pub file_time_limit: Option<TimeBoundary>,
    /// Date part of file names
    #[serde(alias = "fileDateTemplate")]
    pub file_date_template: DateTemplate,
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_size_limit(mut self, limit: impl Into<ByteSize>) -> Self {
        self.file_size_limit = Some(limit.into());
        self
    }

    /// Size limit from a human readable string such as `"10mb"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the size cannot be parsed.
    pub fn with_size_limit_str(self, limit: &str) -> Result<Self> {
        Ok(self.with_size_limit(limit.parse::<ByteSize>()?))
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_time_limit(mut self, boundary: TimeBoundary) -> Self {
        self.file_time_limit = Some(boundary);
        self
    }

    /// Time limit from a token (`MM`, `dd`, `HH`, `mm`, `ss`) or word
    /// (`month` ... `second`).
    ///
    /// # Errors
    ///
    /// Returns `TimerConfig` for an unknown token.
    pub fn with_time_limit_str(self, token: &str) -> Result<Self> {
        Ok(self.with_time_limit(token.parse()?))
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_date_template(mut self, template: impl Into<DateTemplate>) -> Self {
        self.file_date_template = template.into();
        self
    }

    /// Effective size threshold; a zero limit disables size rotation
    #[must_use]
    pub fn size_limit(&self) -> Option<u64> {
        self.file_size_limit
            .map(|limit| limit.bytes())
            .filter(|limit| *limit > 0)
    }
}

/// Gzip `source` into `dest`, then remove `source`.
///
/// On failure, including cancellation through `cancel`, the partial `dest`
/// is removed and `source` is kept.
pub async fn compress_file(source: PathBuf, dest: PathBuf, cancel: CancellationToken) -> Result<()> {
    let (src, dst) = (source.clone(), dest.clone());
    let outcome = tokio::task::spawn_blocking(move || gzip(&src, &dst, &cancel))
        .await
        .map_err(|e| LoggerError::other(format!("compression task failed: {}", e)))?;

    match outcome {
        Ok(()) => tokio::fs::remove_file(&source).await.map_err(|e| {
            LoggerError::io_operation(
                "compress log file",
                format!("Failed to remove compressed source: {}", source.display()),
                e,
            )
        }),
        Err(error) => {
            if let Err(e) = tokio::fs::remove_file(&dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %dest.display(), error = %e, "cannot remove partial archive");
                }
            }
            Err(error)
        }
    }
}

/// Streaming compression, checking `cancel` between chunks
fn gzip(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<()> {
    let input = File::open(source).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", source.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, input);

    let output = File::create(dest).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create compressed file: {}", dest.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(CHUNK_SIZE, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(LoggerError::CompressionCancelled {
                path: source.display().to_string(),
            });
        }

        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            LoggerError::io_operation(
                "compress log file",
                format!("Failed to read from file: {}", source.display()),
                e,
            )
        })?;
        if bytes_read == 0 {
            break;
        }

        encoder.write_all(&buffer[..bytes_read]).map_err(|e| {
            LoggerError::io_operation("compress log file", "Failed to compress data chunk", e)
        })?;
    }

    let mut output = encoder.finish().map_err(|e| {
        LoggerError::io_operation("compress log file", "Failed to finish compression", e)
    })?;
    output.flush().map_err(|e| {
        LoggerError::io_operation("compress log file", "Failed to flush compressed file", e)
    })?;
    drop(output);

    if cancel.is_cancelled() {
        let _ = fs::remove_file(dest);
        return Err(LoggerError::CompressionCancelled {
            path: source.display().to_string(),
        });
    }
    Ok(())
}
