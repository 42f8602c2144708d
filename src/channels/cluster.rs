//! Channel bridging worker processes to their parent
//!
//! On a worker, records are rendered and sent to the parent as `WRITE`
//! envelopes. On the parent, inbound envelopes become records (already
//! rendered, so `transform` is off) on the channel's readable side, where a
//! [`Logger`](crate::core::Logger) forwards them to its other channels.

use crate::core::{
    Channel, ChannelCore, ChannelOptions, Level, LoggerError, Record, Result, Transport,
};
use crate::transports::{Envelope, WorkerLink};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const EXPECTED_TRANSPORT: &str = "worker link";

pub struct ClusterChannel {
    core: ChannelCore,
}

impl ClusterChannel {
    /// # Errors
    ///
    /// Returns `InvalidTransportType` unless `transport` is a [`WorkerLink`],
    /// and `InvalidLevel` for an empty level set.
    pub fn new(transport: Arc<dyn Transport>, options: ChannelOptions) -> Result<Arc<Self>> {
        let Some(link) = transport.as_worker_link() else {
            return Err(LoggerError::invalid_transport(
                EXPECTED_TRANSPORT,
                transport.kind(),
            ));
        };

        let channel = Arc::new(Self {
            core: ChannelCore::new(options)?,
        });
        if !link.is_worker() {
            let this = Arc::downgrade(&channel);
            link.on_message(Some(Arc::new(move |message: Value| {
                if let Some(channel) = this.upgrade() {
                    channel.receive(message);
                }
            })));
        }
        channel.set_transport(transport);
        Ok(channel)
    }

    fn receive(&self, message: Value) {
        let envelope: Envelope = match serde_json::from_value(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring non-envelope message");
                return;
            }
        };
        if !envelope.is_write() {
            return;
        }

        let mut record = Record::message(envelope.data);
        if let Some(level) = Level::from_name(&envelope.level) {
            record.set("level", level);
        }
        record.set_transform(false);
        if !self.push(record.into()) {
            tracing::debug!(channel = %self.core.id(), "readable buffer full");
        }
    }

    fn detach(&self) {
        if let Some(transport) = self.core.take_transport() {
            if let Some(link) = transport.as_worker_link() {
                link.on_message(None);
            }
        }
    }
}

fn link(transport: &Arc<dyn Transport>) -> Result<&WorkerLink> {
    transport
        .as_worker_link()
        .ok_or_else(|| LoggerError::invalid_transport(EXPECTED_TRANSPORT, transport.kind()))
}

#[async_trait]
impl Channel for ClusterChannel {
    fn core(&self) -> &ChannelCore {
        &self.core
    }

    async fn write_record(&self, record: Record) -> Result<()> {
        let data = self.core.format(&record)?;
        let level = record.level().unwrap_or(Level::Debug);
        let transport = self.core.require_transport()?;
        link(&transport)?.send(&Envelope::write(level, data)).await
    }

    /// The link belongs to the process pair; only the listeners go
    async fn finalize(&self) -> Result<()> {
        self.detach();
        Ok(())
    }

    async fn teardown(&self, _error: Option<&LoggerError>) {
        self.detach();
    }
}
