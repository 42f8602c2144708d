//! Fan-out logger
//!
//! A [`Logger`] is a channel whose transport is a set of child channels.
//! Every record it accepts is written to each child in turn; records the
//! children produce on their readable side are written back through the
//! logger so they reach the siblings. A child that fails is reported to the
//! remaining children as a `crit` record.

use super::channel::{Channel, ChannelCore, ChannelId, ChannelOptions, ChannelState};
use super::error::{LoggerError, Result};
use super::events::{ChannelEvent, Subscription};
use super::level::Level;
use super::processor::{host_name, DEFAULT_FACILITY, DEFAULT_VERSION};
use super::record::{ErrorValue, FieldValue, Fields, Payload, Record};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

struct ChildLink {
    channel: Arc<dyn Channel>,
    subscription: u64,
    task: Option<JoinHandle<()>>,
}

pub struct Logger {
    core: ChannelCore,
    children: Mutex<Vec<ChildLink>>,
    this: Weak<Logger>,
}

impl Logger {
    /// Create an active logger without children.
    ///
    /// The context starts with `procid`, `version`, `facility` and
    /// `hostname`; entries in `options.context` take precedence.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for an empty level set.
    pub fn new(options: ChannelOptions) -> Result<Arc<Self>> {
        let core = ChannelCore::new(options)?;
        core.merge_context_defaults(
            Fields::new()
                .with("procid", std::process::id())
                .with("version", DEFAULT_VERSION)
                .with("facility", DEFAULT_FACILITY)
                .with("hostname", host_name()),
        );
        core.activate();
        Ok(Arc::new_cyclic(|this| Self {
            core,
            children: Mutex::new(Vec::new()),
            this: this.clone(),
        }))
    }

    /// Attach `channel` as a child. Adding a child twice is a no-op.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChannel` for the logger itself or a closed channel,
    /// and `ChannelClosed` when the logger is shutting down.
    pub fn add_channel(&self, channel: Arc<dyn Channel>) -> Result<()> {
        if channel.id() == self.core.id() {
            return Err(LoggerError::invalid_channel(
                "a logger cannot be its own channel",
            ));
        }
        if matches!(
            channel.state(),
            ChannelState::Destroying | ChannelState::Closed
        ) {
            return Err(LoggerError::invalid_channel(format!(
                "channel {} is closed",
                channel.id()
            )));
        }
        if !matches!(self.core.state(), ChannelState::Created | ChannelState::Active) {
            return Err(LoggerError::ChannelClosed {
                channel: self.core.id(),
            });
        }

        let mut children = self.children.lock();
        if children.iter().any(|child| child.channel.id() == channel.id()) {
            return Ok(());
        }
        let events = channel.subscribe();
        let subscription = events.id();
        let task = tokio::spawn(forward(self.this.clone(), channel.clone(), events));
        tracing::debug!(logger = %self.core.id(), channel = %channel.id(), "channel added");
        children.push(ChildLink {
            channel,
            subscription,
            task: Some(task),
        });
        Ok(())
    }

    /// Current children
    #[must_use]
    pub fn children(&self) -> Vec<Arc<dyn Channel>> {
        self.children
            .lock()
            .iter()
            .map(|child| child.channel.clone())
            .collect()
    }

    #[must_use]
    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.children
            .lock()
            .iter()
            .any(|child| child.channel.id() == id)
    }

    /// Write `msg` at `level`.
    ///
    /// A map message is spread into the record instead of becoming `msg`;
    /// `context` entries are applied last and win over both.
    pub async fn log_with_context(
        &self,
        level: Level,
        msg: impl Into<FieldValue>,
        context: Fields,
    ) -> Result<bool> {
        let mut record = Record::new();
        record.set("level", level);
        match msg.into() {
            FieldValue::Map(fields) => {
                for (key, value) in fields {
                    record.set(key, value);
                }
            }
            msg => {
                record.set("msg", msg);
            }
        }
        for (key, value) in context {
            record.set(key, value);
        }
        self.write(Payload::Record(record)).await
    }

    /// Write `msg` at `debug`
    pub async fn log(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.debug(msg).await
    }

    pub async fn emerg(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Emergency, msg, Fields::new()).await
    }

    pub async fn alert(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Alert, msg, Fields::new()).await
    }

    pub async fn crit(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Critical, msg, Fields::new()).await
    }

    pub async fn error(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Error, msg, Fields::new()).await
    }

    pub async fn warn(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Warning, msg, Fields::new()).await
    }

    pub async fn note(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Notice, msg, Fields::new()).await
    }

    pub async fn info(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Info, msg, Fields::new()).await
    }

    pub async fn debug(&self, msg: impl Into<FieldValue>) -> Result<bool> {
        self.log_with_context(Level::Debug, msg, Fields::new()).await
    }

    /// While active, a child failure becomes a `crit` record for the other
    /// children; once shutting down it goes to the logger's own subscribers.
    async fn on_child_error(&self, child: ChannelId, error: Arc<LoggerError>) {
        if !self.core.is_active() {
            self.core.events().emit_error(error);
            return;
        }

        let value = ErrorValue::from_error(&*error);
        let mut sd = Fields::new()
            .with("id", "error")
            .with("message", value.message.clone());
        if let Some(source) = &value.source {
            sd.set("source", source.clone());
        }
        let record = Record::new()
            .with("level", Level::Critical)
            .with("pub", child.to_string())
            .with("msg", value)
            .with("sd", sd);

        if let Err(e) = self.write(record.into()).await {
            tracing::warn!(logger = %self.core.id(), channel = %child, error = %e, "cannot report channel failure");
        }
    }

    fn detach(&self, id: ChannelId) {
        let link = {
            let mut children = self.children.lock();
            children
                .iter()
                .position(|child| child.channel.id() == id)
                .map(|index| children.remove(index))
        };
        if let Some(link) = link {
            link.channel.core().events().unsubscribe(link.subscription);
            tracing::debug!(logger = %self.core.id(), channel = %id, "channel detached");
        }
    }

    fn snapshot_for_shutdown(&self) -> (Vec<Arc<dyn Channel>>, Vec<JoinHandle<()>>) {
        let mut children = self.children.lock();
        let channels = children.iter().map(|child| child.channel.clone()).collect();
        let tasks = children
            .iter_mut()
            .filter_map(|child| child.task.take())
            .collect();
        (channels, tasks)
    }
}

async fn forward(logger: Weak<Logger>, child: Arc<dyn Channel>, mut events: Subscription) {
    while let Some(event) = events.recv().await {
        let Some(logger) = logger.upgrade() else {
            break;
        };
        match event {
            ChannelEvent::Data(record) => {
                if logger.core.is_active() {
                    if let Err(e) = logger.write(Payload::Record(record)).await {
                        tracing::debug!(channel = %child.id(), error = %e, "cannot forward record");
                    }
                }
            }
            ChannelEvent::Error(error) => logger.on_child_error(child.id(), error).await,
            ChannelEvent::Finish | ChannelEvent::Close => {
                logger.detach(child.id());
                break;
            }
            ChannelEvent::Drain => {}
        }
    }
}

#[async_trait]
impl Channel for Logger {
    fn core(&self) -> &ChannelCore {
        &self.core
    }

    async fn write_record(&self, record: Record) -> Result<()> {
        for child in self.children() {
            if let Err(e) = child.write(Payload::Record(record.clone())).await {
                tracing::debug!(logger = %self.core.id(), channel = %child.id(), error = %e, "child write failed");
            }
        }
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        let (channels, tasks) = self.snapshot_for_shutdown();
        for result in join_all(channels.iter().map(|child| child.end(None))).await {
            if let Err(e) = result {
                tracing::debug!(logger = %self.core.id(), error = %e, "child did not end cleanly");
            }
        }
        join_all(tasks).await;
        self.children.lock().clear();
        Ok(())
    }

    async fn teardown(&self, _error: Option<&LoggerError>) {
        let (channels, tasks) = self.snapshot_for_shutdown();
        join_all(channels.iter().map(|child| child.destroy(None))).await;
        join_all(tasks).await;
        self.children.lock().clear();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("core", &self.core)
            .field("children", &self.children.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::StreamChannel;
    use crate::transports::MemoryTransport;
    use std::time::Duration;

    fn child(template: &str) -> (Arc<StreamChannel>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let channel = StreamChannel::new(
            transport.clone(),
            ChannelOptions::new().with_template(template),
        )
        .unwrap();
        (channel, transport)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_fans_out_to_every_child() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (a, out_a) = child("%level% %msg%\n");
        let (b, out_b) = child("%msg%\n");
        logger.add_channel(a).unwrap();
        logger.add_channel(b).unwrap();

        logger.info("hello").await.unwrap();
        logger.warn("careful").await.unwrap();

        assert_eq!(out_a.lines(), vec!["info hello", "warn careful"]);
        assert_eq!(out_b.lines(), vec!["hello", "careful"]);
    }

    #[tokio::test]
    async fn test_children_filter_by_level() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let errors_only = StreamChannel::new(
            transport.clone(),
            ChannelOptions::new()
                .with_level(Level::Error)
                .with_template("%msg%\n"),
        )
        .unwrap();
        logger.add_channel(errors_only).unwrap();

        logger.info("skip").await.unwrap();
        logger.error("keep").await.unwrap();
        assert_eq!(transport.lines(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_add_channel_rules() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (a, _) = child("%msg%");

        logger.add_channel(a.clone()).unwrap();
        logger.add_channel(a.clone()).unwrap();
        assert_eq!(logger.children().len(), 1);
        assert!(logger.has_channel(a.id()));

        assert!(matches!(
            logger.add_channel(logger.clone()),
            Err(LoggerError::InvalidChannel { .. })
        ));

        let (closed, _) = child("%msg%");
        closed.destroy(None).await;
        assert!(matches!(
            logger.add_channel(closed),
            Err(LoggerError::InvalidChannel { .. })
        ));
    }

    #[tokio::test]
    async fn test_context_defaults_and_overrides() {
        let logger = Logger::new(
            ChannelOptions::new()
                .with_context_value("appname", "billing")
                .with_context_value("facility", 3),
        )
        .unwrap();
        let (a, out) = child("<%pri%> %hostname% %app_name% %procid% %msg%\n");
        logger.add_channel(a).unwrap();

        logger.info("ready").await.unwrap();
        assert_eq!(
            out.lines(),
            vec![format!(
                "<30> {} billing {} ready",
                host_name(),
                std::process::id()
            )]
        );
        assert_eq!(logger.core().context_value("version"), Some(FieldValue::Int(1)));
    }

    #[tokio::test]
    async fn test_log_with_context_spreads_maps() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (a, out) = child("%msg% %user%\n");
        logger.add_channel(a).unwrap();

        let msg = Fields::new().with("msg", "login").with("user", "ann");
        logger
            .log_with_context(Level::Notice, msg, Fields::new().with("user", "bob"))
            .await
            .unwrap();
        logger.log("plain").await.unwrap();

        assert_eq!(out.lines(), vec!["login bob", "plain -"]);
    }

    #[tokio::test]
    async fn test_child_data_reaches_siblings_only() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (source, out_source) = child("%msg%\n");
        let (sibling, out_sibling) = child("%msg%\n");
        logger.add_channel(source.clone()).unwrap();
        logger.add_channel(sibling).unwrap();

        source.push("from child".into());

        eventually(|| out_sibling.lines() == vec!["from child"]).await;
        assert!(out_source.contents().is_empty());
    }

    #[tokio::test]
    async fn test_child_failure_is_reported_to_siblings() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (failing, broken) = child("%msg%\n");
        let (healthy, out) = child("%level% %msg% %sd%\n");
        logger.add_channel(failing.clone()).unwrap();
        logger.add_channel(healthy).unwrap();

        broken.fail_with("disk on fire");
        logger.info("first").await.unwrap();

        eventually(|| out.lines().len() == 2).await;
        let lines = out.lines();
        assert!(lines[0].starts_with("info first"));
        assert!(lines[1].starts_with("crit "), "{}", lines[1]);
        assert!(lines[1].contains("disk on fire"));
        assert!(lines[1].contains("[error message="));

        eventually(|| !logger.has_channel(failing.id())).await;
        assert_eq!(failing.state(), ChannelState::Closed);
        assert_eq!(logger.children().len(), 1);
    }

    #[tokio::test]
    async fn test_end_waits_for_children() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (a, out_a) = child("%msg%\n");
        let (b, out_b) = child("%msg%\n");
        logger.add_channel(a.clone()).unwrap();
        logger.add_channel(b.clone()).unwrap();
        let mut events = logger.subscribe();

        logger.end(Some("bye".into())).await.unwrap();

        assert_eq!(out_a.lines(), vec!["bye"]);
        assert!(out_a.is_closed() && out_b.is_closed());
        assert_eq!(a.state(), ChannelState::Closed);
        assert_eq!(b.state(), ChannelState::Closed);
        assert!(logger.children().is_empty());
        assert!(matches!(events.recv().await, Some(ChannelEvent::Finish)));
        assert!(matches!(events.recv().await, Some(ChannelEvent::Close)));
    }

    #[tokio::test]
    async fn test_destroy_destroys_children() {
        let logger = Logger::new(ChannelOptions::new()).unwrap();
        let (a, out) = child("%msg%\n");
        logger.add_channel(a.clone()).unwrap();

        logger.destroy(None).await;
        assert!(out.is_destroyed());
        assert_eq!(a.state(), ChannelState::Closed);
        assert!(matches!(
            logger.info("late").await,
            Err(LoggerError::ChannelClosed { .. })
        ));
        assert!(matches!(
            logger.add_channel(child("%msg%").0),
            Err(LoggerError::ChannelClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_nested_loggers() {
        let outer = Logger::new(ChannelOptions::new()).unwrap();
        let inner = Logger::new(ChannelOptions::new()).unwrap();
        let (leaf, out) = child("%msg%\n");
        inner.add_channel(leaf).unwrap();
        outer.add_channel(inner.clone()).unwrap();

        outer.note("deep").await.unwrap();
        assert_eq!(out.lines(), vec!["deep"]);

        outer.end(None).await.unwrap();
        assert_eq!(inner.state(), ChannelState::Closed);
        assert!(out.is_closed());
    }
}
