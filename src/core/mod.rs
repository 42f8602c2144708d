//! Core pipeline: records, channels and the logger

pub mod channel;
pub mod error;
pub mod events;
pub mod formatter;
pub mod handler;
pub mod level;
pub mod logger;
pub mod processor;
pub mod record;
pub mod size;
pub mod timer;
pub mod timestamp;
pub mod transport;
pub mod validator;

pub use channel::{
    fatal_handler, Channel, ChannelCore, ChannelId, ChannelOptions, ChannelState,
    DEFAULT_HIGH_WATER_MARK,
};
pub use error::{LoggerError, Result};
pub use events::{ChannelEvent, EventHub, Subscription, READABLE_HIGH_WATER_MARK};
pub use formatter::{Formatter, RenderHandler, DEFAULT_TEMPLATE};
pub use handler::{Handler, HandlerChain};
pub use level::Level;
pub use logger::Logger;
pub use processor::{ProcessHandler, Processor, DEFAULT_FACILITY, DEFAULT_VERSION};
pub use record::{ErrorValue, FieldValue, Fields, Payload, Record};
pub use size::ByteSize;
pub use timer::{RotationTimer, TimeBoundary};
pub use timestamp::{iso_timestamp, DateTemplate, DEFAULT_DATE_TEMPLATE};
pub use transport::{ErrorHandler, Transport};
pub use validator::{ValidateHandler, Validator};
