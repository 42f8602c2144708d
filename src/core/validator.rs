//! Admission checks run before a payload enters a channel

use super::channel::ChannelCore;
use super::error::Result;
use super::handler::HandlerChain;
use super::record::{FieldValue, Payload};
use std::sync::Arc;

pub type ValidateHandler = dyn Fn(&ChannelCore, &Payload) -> bool + Send + Sync;

/// Ordered set of checks; a payload is admitted only if every check passes
#[derive(Debug, Clone)]
pub struct Validator {
    chain: HandlerChain<ValidateHandler>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            chain: HandlerChain::builtin([
                ("level", Arc::new(level) as Arc<ValidateHandler>),
                ("pub", Arc::new(publisher) as Arc<ValidateHandler>),
            ]),
        }
    }
}

impl Validator {
    /// Validator with the `level` and `pub` checks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator admitting everything
    #[must_use]
    pub fn empty() -> Self {
        Self {
            chain: HandlerChain::new(),
        }
    }

    pub fn set<F>(&mut self, name: impl Into<String>, check: F) -> Result<&mut Self>
    where
        F: Fn(&ChannelCore, &Payload) -> bool + Send + Sync + 'static,
    {
        self.chain.set(name, Arc::new(check))?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.chain.remove(name).is_some()
    }

    #[must_use]
    pub fn chain(&self) -> &HandlerChain<ValidateHandler> {
        &self.chain
    }

    #[must_use]
    pub fn execute(&self, core: &ChannelCore, payload: &Payload) -> bool {
        self.chain.iter().all(|(_, check)| check(core, payload))
    }
}

/// Records must carry a level the channel accepts
fn level(core: &ChannelCore, payload: &Payload) -> bool {
    match payload.as_record() {
        None => true,
        Some(record) => record.level().is_some_and(|level| core.accepts(level)),
    }
}

/// Records published by this channel are never taken back in
fn publisher(core: &ChannelCore, payload: &Payload) -> bool {
    match payload.as_record().and_then(|record| record.get("pub")) {
        Some(FieldValue::String(publisher)) => !core.id().matches(publisher),
        _ => true,
    }
}
