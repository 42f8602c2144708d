//! Ordered chains of named handlers
//!
//! Validators, processors, formatters and the rotation timer are all built
//! from a [`HandlerChain`]: an ordered list of `(name, handler)` pairs owned
//! by the chain instance. Re-registering a name replaces the handler in place
//! and keeps its position.

use super::error::{LoggerError, Result};
use std::fmt;
use std::sync::Arc;

/// Handler threading a value through a chain, called with its owner
pub type Handler<O, T> = dyn Fn(&O, T) -> T + Send + Sync;

pub struct HandlerChain<H: ?Sized> {
    handlers: Vec<(String, Arc<H>)>,
}

impl<H: ?Sized> HandlerChain<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Chain of built-in handlers with fixed, distinct names
    pub(crate) fn builtin(entries: impl IntoIterator<Item = (&'static str, Arc<H>)>) -> Self {
        Self {
            handlers: entries
                .into_iter()
                .map(|(name, handler)| (name.to_string(), handler))
                .collect(),
        }
    }

    /// Register `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandler` when `name` is empty.
    pub fn set(&mut self, name: impl Into<String>, handler: Arc<H>) -> Result<&mut Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LoggerError::invalid_handler("handler name must not be empty"));
        }
        match self.handlers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = handler,
            None => self.handlers.push((name, handler)),
        }
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<H>> {
        self.handlers.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.handlers.iter().any(|(n, _)| n == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<H>> {
        let index = self.handlers.iter().position(|(n, _)| n == name)?;
        Some(self.handlers.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<H>)> {
        self.handlers.iter().map(|(n, h)| (n.as_str(), h))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<O: ?Sized, T> HandlerChain<Handler<O, T>> {
    /// Thread `value` through every handler in registration order
    pub fn execute(&self, owner: &O, value: T) -> T {
        self.handlers
            .iter()
            .fold(value, |value, (_, handler)| handler(owner, value))
    }
}

impl<H: ?Sized> Default for HandlerChain<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> Clone for HandlerChain<H> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<H: ?Sized> fmt::Debug for HandlerChain<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
