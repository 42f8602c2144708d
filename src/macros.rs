//! Logging macros with `format!` style messages.
//!
//! Each macro formats its arguments and returns the logger's write future.
//!
//! # Examples
//!
//! ```
//! use rust_channel_logger::core::{ChannelOptions, Logger};
//! use rust_channel_logger::info;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rust_channel_logger::core::Result<()> {
//! let logger = Logger::new(ChannelOptions::new())?;
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port).await?;
//! # Ok(())
//! # }
//! ```

/// Log a formatted message at an explicit level.
///
/// ```
/// # use rust_channel_logger::core::{ChannelOptions, Level, Logger};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// # let logger = Logger::new(ChannelOptions::new()).unwrap();
/// use rust_channel_logger::log;
/// log!(logger, Level::Notice, "Error code: {}", 500).await.unwrap();
/// # }
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_with_context($level, format!($($arg)+), $crate::core::Fields::new())
    };
}

#[macro_export]
macro_rules! emerg {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Emergency, $($arg)+)
    };
}

#[macro_export]
macro_rules! alert {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Alert, $($arg)+)
    };
}

#[macro_export]
macro_rules! crit {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Critical, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! note {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Notice, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Info, $($arg)+)
    };
}

/// Log a debug-level message.
///
/// ```
/// # use rust_channel_logger::core::{ChannelOptions, Logger};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// # let logger = Logger::new(ChannelOptions::new()).unwrap();
/// use rust_channel_logger::debug;
/// debug!(logger, "Counter value: {}", 10).await.unwrap();
/// # }
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Level::Debug, $($arg)+)
    };
}
