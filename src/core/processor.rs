//! Record enrichment
//!
//! Each built-in step fills one field when it is absent and leaves it alone
//! otherwise, so running the processor twice over a record changes nothing.

use super::channel::ChannelCore;
use super::error::Result;
use super::handler::{Handler, HandlerChain};
use super::level::Level;
use super::record::{FieldValue, Payload, Record};
use super::timestamp::iso_timestamp;
use std::sync::{Arc, OnceLock};

pub type ProcessHandler = Handler<ChannelCore, Record>;

/// Syslog facility used when neither the record nor the context sets one
pub const DEFAULT_FACILITY: i64 = 1;

/// Syslog protocol version stamped on every record
pub const DEFAULT_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct Processor {
    chain: HandlerChain<ProcessHandler>,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            chain: HandlerChain::builtin([
                ("context", Arc::new(context) as Arc<ProcessHandler>),
                ("procid", Arc::new(procid) as Arc<ProcessHandler>),
                ("version", Arc::new(version) as Arc<ProcessHandler>),
                ("facility", Arc::new(facility) as Arc<ProcessHandler>),
                ("hostname", Arc::new(hostname) as Arc<ProcessHandler>),
                ("appname", Arc::new(appname) as Arc<ProcessHandler>),
                ("level", Arc::new(level) as Arc<ProcessHandler>),
                ("pri", Arc::new(priority) as Arc<ProcessHandler>),
                ("pub", Arc::new(publisher) as Arc<ProcessHandler>),
                ("timestamp", Arc::new(timestamp) as Arc<ProcessHandler>),
            ]),
        }
    }
}

impl Processor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor that only converts payloads into records
    #[must_use]
    pub fn empty() -> Self {
        Self {
            chain: HandlerChain::new(),
        }
    }

    pub fn set<F>(&mut self, name: impl Into<String>, step: F) -> Result<&mut Self>
    where
        F: Fn(&ChannelCore, Record) -> Record + Send + Sync + 'static,
    {
        self.chain.set(name, Arc::new(step))?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.chain.remove(name).is_some()
    }

    #[must_use]
    pub fn chain(&self) -> &HandlerChain<ProcessHandler> {
        &self.chain
    }

    /// Turn `payload` into a record and run every step over it
    pub fn execute(&self, core: &ChannelCore, payload: Payload) -> Record {
        self.chain.execute(core, payload.into_record())
    }
}

/// Name of the host this process runs on
pub fn host_name() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    })
}

fn context(core: &ChannelCore, mut record: Record) -> Record {
    for (key, value) in core.context() {
        if !record.has(&key) {
            record.set(key, value);
        }
    }
    record
}

fn procid(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("procid", || FieldValue::from(std::process::id()));
    record
}

fn version(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("version", || FieldValue::Int(DEFAULT_VERSION));
    record
}

fn facility(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("facility", || FieldValue::Int(DEFAULT_FACILITY));
    record
}

fn hostname(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("hostname", || FieldValue::from(host_name()));
    record
}

fn appname(core: &ChannelCore, mut record: Record) -> Record {
    if record.has("app_name") {
        return record;
    }
    if let Some(name) = core.context_value("appname") {
        record.fill("appname", || name);
    }
    record
}

fn level(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("level", || FieldValue::Level(Level::Debug));
    record
}

fn priority(_: &ChannelCore, mut record: Record) -> Record {
    if record.has("pri") {
        return record;
    }
    let facility = record
        .get("facility")
        .and_then(FieldValue::as_int)
        .unwrap_or(DEFAULT_FACILITY);
    let code = record.level().unwrap_or(Level::Debug).code();
    record.set("pri", facility * 8 + i64::from(code));
    record
}

fn publisher(core: &ChannelCore, mut record: Record) -> Record {
    record.fill("pub", || FieldValue::String(core.id().to_string()));
    record
}

fn timestamp(_: &ChannelCore, mut record: Record) -> Record {
    record.fill("timestamp", || FieldValue::String(iso_timestamp(chrono::Utc::now())));
    record
}
