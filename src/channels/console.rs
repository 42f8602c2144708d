//! Console channel implementation

use crate::core::level::COLOR_RESET;
use crate::core::{Channel, ChannelCore, ChannelOptions, Level, Record, Result, Transport};
use crate::transports::StdoutTransport;
use std::sync::Arc;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub channel: ChannelOptions,
    pub color: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            channel: ChannelOptions::default(),
            color: true,
        }
    }
}

impl ConsoleOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Color only when the environment allows it (`NO_COLOR`, `CLICOLOR`, ...)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            channel: ChannelOptions::default(),
            color: colored::control::SHOULD_COLORIZE.should_colorize(),
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: ChannelOptions) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

pub struct ConsoleChannel {
    core: ChannelCore,
    color: bool,
}

impl ConsoleChannel {
    /// Console channel on the process' standard output
    pub fn new(options: ConsoleOptions) -> Result<Arc<Self>> {
        Self::with_transport(Arc::new(StdoutTransport::new()), options)
    }

    /// Console channel on another transport
    pub fn with_transport(transport: Arc<dyn Transport>, options: ConsoleOptions) -> Result<Arc<Self>> {
        let channel = Arc::new(Self {
            core: ChannelCore::new(options.channel)?,
            color: options.color,
        });
        channel.set_transport(transport);
        Ok(channel)
    }

    #[must_use]
    pub fn color(&self) -> bool {
        self.color
    }

    fn colorize(level: Level, line: &str) -> String {
        format!("{}{}{}", level.ansi(), line, COLOR_RESET)
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn core(&self) -> &ChannelCore {
        &self.core
    }

    async fn write_record(&self, record: Record) -> Result<()> {
        let line = self.core.format(&record)?;
        let line = if self.color {
            Self::colorize(record.level().unwrap_or(Level::Debug), &line)
        } else {
            line
        };
        self.core.require_transport()?.write(line.as_bytes()).await
    }

    /// Stdout outlives the channel: flush it, never release it
    async fn finalize(&self) -> Result<()> {
        match self.core.transport() {
            Some(transport) => transport.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::MemoryTransport;

    fn console(color: bool) -> (Arc<ConsoleChannel>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let options = ConsoleOptions::new()
            .with_color(color)
            .with_channel(ChannelOptions::new().with_template("%msg%"));
        let channel = ConsoleChannel::with_transport(transport.clone(), options).unwrap();
        (channel, transport)
    }

    #[tokio::test]
    async fn test_colored_output() {
        let (channel, transport) = console(true);
        let record = Record::message("boom").with("level", Level::Error);
        channel.write(record.into()).await.unwrap();

        assert_eq!(transport.contents_string(), "\u{1b}[31mboom\u{1b}[0m");
    }

    #[tokio::test]
    async fn test_info_uses_reset_color() {
        let (channel, transport) = console(true);
        let record = Record::message("hi").with("level", Level::Info);
        channel.write(record.into()).await.unwrap();

        assert_eq!(transport.contents_string(), "\u{1b}[0mhi\u{1b}[0m");
    }

    #[tokio::test]
    async fn test_plain_output() {
        let (channel, transport) = console(false);
        channel.write("plain".into()).await.unwrap();
        assert_eq!(transport.contents_string(), "plain");
        assert!(!channel.color());
    }

    #[test]
    fn test_default_options() {
        let options = ConsoleOptions::default();
        assert!(options.color);
        assert_eq!(options.channel.high_water_mark, crate::core::DEFAULT_HIGH_WATER_MARK);
    }
}
