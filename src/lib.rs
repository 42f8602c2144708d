//! # Rust Channel Logger
//!
//! Structured logging built from composable channels.
//!
//! A record flows through a channel's validator, processor and formatter and
//! lands on the channel's transport. A [`Logger`](core::Logger) is itself a
//! channel that fans every record out to its children, so channels and
//! loggers nest freely.
//!
//! ## Features
//!
//! - **Syslog-style records**: eight severity levels, `pri`, `hostname`,
//!   `procid` and structured data rendered in a configurable template
//! - **File channel**: size and calendar based rotation with gzip archives
//! - **Cluster channel**: worker processes log through their parent
//! - **Console channel**: ANSI colored output per level
//! - **Async**: built on tokio, with back-pressure and graceful shutdown
//!
//! ```
//! use rust_channel_logger::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "demo"))?;
//! let memory = Arc::new(MemoryTransport::new());
//! logger.add_channel(StreamChannel::new(memory.clone(), ChannelOptions::new().with_template("%level% %msg%\n"))?)?;
//!
//! logger.info("started").await?;
//! logger.end(None).await?;
//! assert_eq!(memory.lines(), vec!["info started"]);
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod core;
pub mod macros;
pub mod transports;

pub mod prelude {
    pub use crate::channels::{
        ClusterChannel, ConsoleChannel, ConsoleOptions, FileChannel, FileChannelOptions,
        RotationPolicy, StreamChannel,
    };
    pub use crate::core::{
        Channel, ChannelEvent, ChannelId, ChannelOptions, ChannelState, ErrorValue, FieldValue,
        Fields, Formatter, Level, Logger, LoggerError, Payload, Processor, Record, Result,
        TimeBoundary, Transport, Validator,
    };
    pub use crate::transports::{MemoryTransport, WorkerLink};
}

pub use self::channels::{ClusterChannel, ConsoleChannel, FileChannel, StreamChannel};
pub use self::core::{
    Channel, ChannelOptions, FieldValue, Fields, Level, Logger, LoggerError, Record, Result,
};
