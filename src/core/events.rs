//! Readable side of a channel
//!
//! Every channel owns an [`EventHub`]. Consumers call `subscribe` and receive
//! the records the channel pushes plus its lifecycle signals. Records pushed
//! while nobody listens are buffered and handed to the next subscriber.

use super::error::LoggerError;
use super::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Number of buffered records after which `push` asks producers to pause
pub const READABLE_HIGH_WATER_MARK: usize = 16;

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A record produced by the channel
    Data(Record),
    /// The channel failed; it is destroyed right after
    Error(Arc<LoggerError>),
    /// Writers waiting on back-pressure may resume
    Drain,
    /// Graceful shutdown completed
    Finish,
    /// Terminal signal, always the last event
    Close,
}

/// Event stream handed out by [`EventHub::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: UnboundedReceiver<ChannelEvent>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, `None` once the channel closed and every event was read
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next `Data` event, skipping lifecycle signals
    pub async fn next_record(&mut self) -> Option<Record> {
        while let Some(event) = self.recv().await {
            if let ChannelEvent::Data(record) = event {
                return Some(record);
            }
        }
        None
    }
}

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    subscribers: Vec<(u64, UnboundedSender<ChannelEvent>)>,
    buffered: VecDeque<Record>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct EventHub {
    state: Mutex<HubState>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        for record in state.buffered.drain(..) {
            let _ = sender.send(ChannelEvent::Data(record));
        }
        if state.closed {
            let _ = sender.send(ChannelEvent::Close);
        } else {
            state.subscribers.push((id, sender));
        }
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|(sid, _)| *sid != id);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.state.lock().buffered.len()
    }

    /// Deliver a record to every subscriber, or buffer it.
    ///
    /// Returns false when the buffer reached its high-water mark or the hub
    /// is closed. Records arriving at a full buffer are dropped.
    pub fn publish(&self, record: Record) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.subscribers.retain(|(_, sender)| !sender.is_closed());
        if state.subscribers.is_empty() {
            if state.buffered.len() >= READABLE_HIGH_WATER_MARK {
                tracing::debug!(record = %record, "readable buffer full, dropping record");
                return false;
            }
            state.buffered.push_back(record);
            return state.buffered.len() < READABLE_HIGH_WATER_MARK;
        }
        for (_, sender) in &state.subscribers {
            let _ = sender.send(ChannelEvent::Data(record.clone()));
        }
        true
    }

    /// Broadcast a lifecycle signal
    pub fn emit(&self, event: ChannelEvent) {
        let state = self.state.lock();
        if state.closed {
            return;
        }
        for (_, sender) in &state.subscribers {
            let _ = sender.send(event.clone());
        }
    }

    pub fn emit_error(&self, error: Arc<LoggerError>) {
        let state = self.state.lock();
        if state.subscribers.is_empty() {
            tracing::warn!(error = %error, "channel error with no subscriber");
            return;
        }
        for (_, sender) in &state.subscribers {
            let _ = sender.send(ChannelEvent::Error(error.clone()));
        }
    }

    /// Send `Close` and end every subscription
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        for (_, sender) in state.subscribers.drain(..) {
            let _ = sender.send(ChannelEvent::Close);
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
