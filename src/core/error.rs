//! Error types for the channel logger

use super::channel::ChannelId;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Level value outside of the severity table
    #[error("Invalid level: {value}")]
    InvalidLevel { value: String },

    /// Transport handed to a channel that cannot drive it
    #[error("Invalid transport type: expected {expected}, found {found}")]
    InvalidTransportType { expected: String, found: String },

    /// Channel that cannot be attached to a logger
    #[error("Invalid channel: {reason}")]
    InvalidChannel { reason: String },

    /// Handler that cannot be registered in a chain
    #[error("Invalid handler: {reason}")]
    InvalidHandler { reason: String },

    /// Single formatted message larger than the size rotation threshold
    #[error("Message size {size} bytes over file size limit of {limit} bytes")]
    MessageTooLarge { size: u64, limit: u64 },

    /// Structured data entry that cannot be rendered
    #[error("Structured data error: {message}")]
    StructuredData { message: String },

    /// Unknown rotation time token
    #[error("Timer time token '{token}' is not supported")]
    TimerConfig { token: String },

    /// Rotation timer callback misuse
    #[error("Timer callback error: {message}")]
    TimerCallback { message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotation { path: String, message: String },

    /// Compression aborted through the channel's cancellation token
    #[error("Compression of '{path}' was cancelled")]
    CompressionCancelled { path: String },

    /// Write or end on a channel that no longer accepts records
    #[error("Channel {channel} is closed")]
    ChannelClosed { channel: ChannelId },

    /// Write on a channel that has no transport attached
    #[error("Channel {channel} has no transport")]
    NoTransport { channel: ChannelId },

    /// The channel was destroyed by a fatal error
    #[error("Channel {channel} failed: {source}")]
    ChannelFailed {
        channel: ChannelId,
        #[source]
        source: Arc<LoggerError>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid level error
    pub fn invalid_level(value: impl Into<String>) -> Self {
        LoggerError::InvalidLevel {
            value: value.into(),
        }
    }

    /// Create an invalid transport type error
    pub fn invalid_transport(expected: impl Into<String>, found: impl Into<String>) -> Self {
        LoggerError::InvalidTransportType {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid channel error
    pub fn invalid_channel(reason: impl Into<String>) -> Self {
        LoggerError::InvalidChannel {
            reason: reason.into(),
        }
    }

    /// Create an invalid handler error
    pub fn invalid_handler(reason: impl Into<String>) -> Self {
        LoggerError::InvalidHandler {
            reason: reason.into(),
        }
    }

    /// Create a structured data error
    pub fn structured_data(message: impl Into<String>) -> Self {
        LoggerError::StructuredData {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error is a transport or I/O failure.
    ///
    /// Fatal errors drive a channel into its destroyed state; everything else
    /// is reported to the caller of the failed operation only.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoggerError::IoOperation { .. }
                | LoggerError::Io(_)
                | LoggerError::Json(_)
                | LoggerError::FileRotation { .. }
                | LoggerError::ChannelFailed { .. }
        )
    }

    /// Whether this error is the expected outcome of a forced shutdown
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LoggerError::CompressionCancelled { .. })
    }
}
