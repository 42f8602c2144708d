//! Channel formatting records onto any transport

use crate::core::{Channel, ChannelCore, ChannelOptions, Record, Result, Transport};
use async_trait::async_trait;
use std::sync::Arc;

pub struct StreamChannel {
    core: ChannelCore,
}

impl StreamChannel {
    /// Channel writing through `transport`
    pub fn new(transport: Arc<dyn Transport>, options: ChannelOptions) -> Result<Arc<Self>> {
        let channel = Self::detached(options)?;
        channel.set_transport(transport);
        Ok(channel)
    }

    /// Channel without a transport; attach one with `set_transport`
    pub fn detached(options: ChannelOptions) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            core: ChannelCore::new(options)?,
        }))
    }
}

#[async_trait]
impl Channel for StreamChannel {
    fn core(&self) -> &ChannelCore {
        &self.core
    }

    async fn write_record(&self, record: Record) -> Result<()> {
        let line = self.core.format(&record)?;
        self.core.require_transport()?.write(line.as_bytes()).await
    }
}
