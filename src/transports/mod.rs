//! Transport implementations

pub mod file;
pub mod memory;
pub mod stdout;
pub mod worker_link;

pub use file::FileTransport;
pub use memory::MemoryTransport;
pub use stdout::StdoutTransport;
pub use worker_link::{Envelope, LinkRole, MessageHandler, WorkerLink, WRITE_COMMAND};
