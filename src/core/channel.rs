//! Channel contract
//!
//! A channel is a pipeline node: payloads written to it are validated,
//! enriched into records and handed to a transport-specific
//! [`Channel::write_record`]; records it receives from its transport are
//! pushed to subscribers through its readable side.
//!
//! Lifecycle:
//!
//! ```text
//! Created --transport--> Active --end--> Ending --> Closed
//!                          \______________________/
//!                            destroy (Destroying)
//! ```

use super::error::{LoggerError, Result};
use super::events::{ChannelEvent, EventHub, Subscription};
use super::formatter::Formatter;
use super::level::Level;
use super::processor::Processor;
use super::record::{FieldValue, Fields, Payload, Record};
use super::transport::{ErrorHandler, Transport};
use super::validator::Validator;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use uuid::Uuid;

/// Number of in-flight writes after which `write` asks callers to wait
pub const DEFAULT_HIGH_WATER_MARK: usize = 50;

/// Stable identity of a channel; serializes as its UUID string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(Uuid);

impl ChannelId {
    #[must_use]
    pub fn new() -> Self {
        ChannelId(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Whether `text` is this id's string form
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        Uuid::parse_str(text).is_ok_and(|uuid| uuid == self.0)
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No transport attached yet
    Created,
    /// Accepting writes
    Active,
    /// `end` requested, flushing
    Ending,
    /// Forced shutdown in progress
    Destroying,
    /// Terminal
    Closed,
}

/// Settings shared by every channel kind
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub levels: Option<Vec<Level>>,
    pub context: Fields,
    pub validator: Option<Validator>,
    pub processor: Option<Processor>,
    pub formatter: Option<Formatter>,
    pub high_water_mark: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            levels: None,
            context: Fields::new(),
            validator: None,
            processor: None,
            formatter: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl ChannelOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_levels(mut self, levels: impl Into<Vec<Level>>) -> Self {
        self.levels = Some(levels.into());
        self
    }

    #[must_use]
    pub fn with_level(self, level: Level) -> Self {
        self.with_levels(vec![level])
    }

    #[must_use]
    pub fn with_context(mut self, context: Fields) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_context_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.context.set(key, value);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = Some(processor);
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use]
    pub fn with_template(self, template: impl Into<String>) -> Self {
        self.with_formatter(Formatter::new(template))
    }

    #[must_use]
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark.max(1);
        self
    }
}

fn checked_levels(levels: &[Level]) -> Result<Vec<Level>> {
    if levels.is_empty() {
        return Err(LoggerError::invalid_level("level set must not be empty"));
    }
    let mut accepted = levels.to_vec();
    accepted.sort();
    accepted.dedup();
    Ok(accepted)
}

/// State shared by every channel implementation
pub struct ChannelCore {
    id: ChannelId,
    levels: RwLock<Vec<Level>>,
    context: RwLock<Fields>,
    validator: RwLock<Arc<Validator>>,
    processor: RwLock<Arc<Processor>>,
    formatter: RwLock<Arc<Formatter>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    state: Mutex<ChannelState>,
    paused: AtomicBool,
    gate: tokio::sync::Mutex<()>,
    pending: AtomicUsize,
    need_drain: AtomicBool,
    drain: Notify,
    high_water_mark: usize,
    events: EventHub,
}

impl ChannelCore {
    /// # Errors
    ///
    /// Returns `InvalidLevel` when `options.levels` is an empty set.
    pub fn new(options: ChannelOptions) -> Result<Self> {
        let levels = match options.levels {
            Some(levels) => checked_levels(&levels)?,
            None => Level::ALL.to_vec(),
        };
        Ok(Self {
            id: ChannelId::new(),
            levels: RwLock::new(levels),
            context: RwLock::new(options.context),
            validator: RwLock::new(Arc::new(options.validator.unwrap_or_default())),
            processor: RwLock::new(Arc::new(options.processor.unwrap_or_default())),
            formatter: RwLock::new(Arc::new(options.formatter.unwrap_or_default())),
            transport: RwLock::new(None),
            state: Mutex::new(ChannelState::Created),
            paused: AtomicBool::new(false),
            gate: tokio::sync::Mutex::new(()),
            pending: AtomicUsize::new(0),
            need_drain: AtomicBool::new(false),
            drain: Notify::new(),
            high_water_mark: options.high_water_mark.max(1),
            events: EventHub::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    #[must_use]
    pub fn levels(&self) -> Vec<Level> {
        self.levels.read().clone()
    }

    #[must_use]
    pub fn accepts(&self, level: Level) -> bool {
        self.levels.read().contains(&level)
    }

    /// Replace the accepted level set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for an empty set.
    pub fn set_levels(&self, levels: &[Level]) -> Result<()> {
        *self.levels.write() = checked_levels(levels)?;
        Ok(())
    }

    /// Replace the accepted level set by level names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for an empty set or an unknown name.
    pub fn set_level_names<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let levels = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Level>>>()?;
        self.set_levels(&levels)
    }

    #[must_use]
    pub fn context(&self) -> Fields {
        self.context.read().clone()
    }

    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<FieldValue> {
        self.context.read().get(key).cloned()
    }

    pub fn set_context_value(&self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.context.write().set(key, value);
    }

    pub(crate) fn merge_context_defaults(&self, defaults: Fields) {
        let mut context = self.context.write();
        let mut merged = defaults;
        merged.merge(std::mem::take(&mut *context));
        *context = merged;
    }

    #[must_use]
    pub fn validator(&self) -> Arc<Validator> {
        self.validator.read().clone()
    }

    pub fn set_validator(&self, validator: Validator) {
        *self.validator.write() = Arc::new(validator);
    }

    #[must_use]
    pub fn processor(&self) -> Arc<Processor> {
        self.processor.read().clone()
    }

    pub fn set_processor(&self, processor: Processor) {
        *self.processor.write() = Arc::new(processor);
    }

    #[must_use]
    pub fn formatter(&self) -> Arc<Formatter> {
        self.formatter.read().clone()
    }

    pub fn set_formatter(&self, formatter: Formatter) {
        *self.formatter.write() = Arc::new(formatter);
    }

    /// Run the validator
    #[must_use]
    pub fn validate(&self, payload: &Payload) -> bool {
        self.validator().execute(self, payload)
    }

    /// Run the processor
    #[must_use]
    pub fn process(&self, payload: Payload) -> Record {
        self.processor().execute(self, payload)
    }

    /// Render with the current formatter
    pub fn format(&self, record: &Record) -> Result<String> {
        self.formatter().format(self, record)
    }

    #[must_use]
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.read().clone()
    }

    /// The attached transport.
    ///
    /// # Errors
    ///
    /// Returns `NoTransport` when none is attached.
    pub fn require_transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport()
            .ok_or(LoggerError::NoTransport { channel: self.id })
    }

    /// Swap transports: the old one stops reporting into this channel, the
    /// new one reports into `on_error`. A created channel becomes active.
    pub fn replace_transport(
        &self,
        transport: Arc<dyn Transport>,
        on_error: ErrorHandler,
    ) -> Option<Arc<dyn Transport>> {
        transport.on_error(Some(on_error));
        let previous = self.transport.write().replace(transport);
        if let Some(previous) = &previous {
            previous.on_error(None);
        }
        self.activate();
        previous
    }

    /// Detach and return the transport
    pub fn take_transport(&self) -> Option<Arc<dyn Transport>> {
        let transport = self.transport.write().take();
        if let Some(transport) = &transport {
            transport.on_error(None);
        }
        transport
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ChannelState::Active
    }

    /// Move a created channel to `Active`
    pub fn activate(&self) {
        let mut state = self.state.lock();
        if *state == ChannelState::Created {
            *state = ChannelState::Active;
        }
    }

    /// Set while a rotation swaps files; writes queue behind the swap
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Whether a writer was told to wait for `Drain`
    #[must_use]
    pub fn needs_drain(&self) -> bool {
        self.need_drain.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        match self.state() {
            ChannelState::Active => Ok(()),
            ChannelState::Created => Err(LoggerError::NoTransport { channel: self.id }),
            _ => Err(LoggerError::ChannelClosed { channel: self.id }),
        }
    }

    /// Count a write in; returns whether the caller may keep writing
    pub(crate) fn enter_write(&self) -> bool {
        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if pending >= self.high_water_mark {
            self.need_drain.store(true, Ordering::Release);
            return false;
        }
        true
    }

    pub(crate) fn leave_write(&self) {
        let pending = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        if pending == 0 && self.need_drain.swap(false, Ordering::AcqRel) {
            self.events.emit(ChannelEvent::Drain);
            self.drain.notify_waiters();
        }
    }

    pub(crate) fn gate(&self) -> &tokio::sync::Mutex<()> {
        &self.gate
    }

    /// Wait until back-pressure is released
    pub async fn drained(&self) {
        loop {
            let notified = self.drain.notified();
            if !self.needs_drain() {
                return;
            }
            notified.await;
        }
    }

    /// `Active`/`Created` to `Ending`; false when already shutting down
    pub(crate) fn begin_end(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ChannelState::Created | ChannelState::Active => {
                *state = ChannelState::Ending;
                true
            }
            _ => false,
        }
    }

    /// Any non-terminal state to `Destroying`; false when already there
    pub(crate) fn begin_destroy(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ChannelState::Destroying | ChannelState::Closed => false,
            _ => {
                *state = ChannelState::Destroying;
                true
            }
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.state.lock() = ChannelState::Closed;
    }
}

impl fmt::Debug for ChannelCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCore")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("levels", &*self.levels.read())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

/// Error listener that destroys `channel` with the reported error
pub fn fatal_handler(channel: Weak<dyn Channel>) -> ErrorHandler {
    Arc::new(move |error: Arc<LoggerError>| {
        let Some(channel) = channel.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { channel.destroy_shared(Some(error)).await });
            }
            Err(_) => {
                tracing::warn!(channel = %channel.id(), error = %error, "transport error outside of a runtime");
            }
        }
    })
}

/// A pipeline node with one transport strategy.
///
/// Implementors supply [`Channel::core`] and [`Channel::write_record`];
/// `finalize` and `teardown` default to closing and destroying the attached
/// transport. Everything else is provided.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    fn core(&self) -> &ChannelCore;

    /// Deliver one validated, enriched record
    async fn write_record(&self, record: Record) -> Result<()>;

    /// Graceful shutdown, after every queued write completed
    async fn finalize(&self) -> Result<()> {
        match self.core().take_transport() {
            Some(transport) => transport.close().await,
            None => Ok(()),
        }
    }

    /// Forced shutdown
    async fn teardown(&self, _error: Option<&LoggerError>) {
        if let Some(transport) = self.core().take_transport() {
            transport.destroy().await;
        }
    }

    fn id(&self) -> ChannelId {
        self.core().id()
    }

    fn state(&self) -> ChannelState {
        self.core().state()
    }

    fn set_levels(&self, levels: &[Level]) -> Result<()> {
        self.core().set_levels(levels)
    }

    fn subscribe(&self) -> Subscription {
        self.core().events().subscribe()
    }

    /// Enrich `payload` and hand it to subscribers.
    ///
    /// Returns false when the readable buffer is full or the channel closed.
    fn push(&self, payload: Payload) -> bool {
        let core = self.core();
        if matches!(core.state(), ChannelState::Destroying | ChannelState::Closed) {
            return false;
        }
        core.events().publish(core.process(payload))
    }

    /// Validate, enrich and deliver `payload`.
    ///
    /// A payload rejected by the validator is dropped silently. The returned
    /// flag is false when the caller should wait for [`Channel::drained`].
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed`/`NoTransport` when the channel does not accept
    /// writes, the transport strategy's error when delivery fails, and
    /// `ChannelFailed` when that failure destroyed the channel.
    async fn write(&self, payload: Payload) -> Result<bool> {
        let core = self.core();
        core.ensure_writable()?;
        if !core.validate(&payload) {
            return Ok(!core.needs_drain());
        }
        let record = core.process(payload);
        self.deliver(record).await
    }

    /// Write an already enriched record in submission order
    async fn deliver(&self, record: Record) -> Result<bool> {
        let core = self.core();
        let may_continue = core.enter_write();
        let result = {
            let _gate = core.gate().lock().await;
            self.write_record(record).await
        };
        core.leave_write();

        match result {
            Ok(()) => Ok(may_continue),
            Err(error) if error.is_fatal() => {
                let error = Arc::new(error);
                self.destroy_shared(Some(error.clone())).await;
                Err(LoggerError::ChannelFailed {
                    channel: core.id(),
                    source: error,
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Optionally write a last payload, then shut down gracefully.
    ///
    /// The channel finalizes even when the last payload fails to write; that
    /// failure is returned once the channel closed.
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` when the channel is already shutting down,
    /// the last payload's write error, and `ChannelFailed` when finalizing
    /// failed and destroyed the channel.
    async fn end(&self, payload: Option<Payload>) -> Result<()> {
        let core = self.core();
        let mut last_write = Ok(());
        if let Some(payload) = payload {
            if core.ensure_writable().is_ok() && core.validate(&payload) {
                let record = core.process(payload);
                last_write = self.deliver(record).await.map(|_| ());
            }
        }
        if !core.begin_end() {
            last_write?;
            return Err(LoggerError::ChannelClosed { channel: core.id() });
        }
        drop(core.gate().lock().await);

        match self.finalize().await {
            Ok(()) => {
                core.mark_closed();
                core.events().emit(ChannelEvent::Finish);
                core.events().close();
                last_write
            }
            Err(error) => {
                let error = Arc::new(error);
                self.destroy_shared(Some(error.clone())).await;
                Err(LoggerError::ChannelFailed {
                    channel: core.id(),
                    source: error,
                })
            }
        }
    }

    /// Shut down immediately; `error` is reported to subscribers
    async fn destroy(&self, error: Option<LoggerError>) {
        self.destroy_shared(error.map(Arc::new)).await;
    }

    async fn destroy_shared(&self, error: Option<Arc<LoggerError>>) {
        let core = self.core();
        if !core.begin_destroy() {
            return;
        }
        self.teardown(error.as_deref()).await;
        core.mark_closed();
        if let Some(error) = error {
            core.events().emit_error(error);
        }
        core.events().close();
    }

    async fn drained(&self) {
        self.core().drained().await;
    }

    /// Attach `transport`, routing its errors into this channel's fatal path
    fn set_transport(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Option<Arc<dyn Transport>>
    where
        Self: Sized,
    {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.core().replace_transport(transport, fatal_handler(weak))
    }
}
