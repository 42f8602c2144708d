//! Channel implementations

pub mod cluster;
pub mod console;
pub mod file;
pub mod rotation;
pub mod stream;

pub use cluster::ClusterChannel;
pub use console::{ConsoleChannel, ConsoleOptions};
pub use file::{FileChannel, FileChannelOptions};
pub use rotation::{compress_file, RotationPolicy};
pub use stream::StreamChannel;
