//! Periodic rotation timer aligned to UTC calendar boundaries

use super::error::{LoggerError, Result};
use super::handler::HandlerChain;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Computes the next boundary strictly after `now`
pub type BoundaryHandler = dyn Fn(DateTime<Utc>) -> DateTime<Utc> + Send + Sync;

/// Calendar unit a rotation timer fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeBoundary {
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeBoundary {
    /// Token naming this boundary in the timer chain
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            TimeBoundary::Month => "MM",
            TimeBoundary::Day => "dd",
            TimeBoundary::Hour => "HH",
            TimeBoundary::Minute => "mm",
            TimeBoundary::Second => "ss",
        }
    }
}

impl FromStr for TimeBoundary {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MM" | "month" => Ok(TimeBoundary::Month),
            "dd" | "day" => Ok(TimeBoundary::Day),
            "HH" | "hour" => Ok(TimeBoundary::Hour),
            "mm" | "minute" => Ok(TimeBoundary::Minute),
            "ss" | "second" => Ok(TimeBoundary::Second),
            other => Err(LoggerError::TimerConfig {
                token: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TimeBoundary {
    type Error = LoggerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeBoundary> for String {
    fn from(boundary: TimeBoundary) -> Self {
        boundary.token().to_string()
    }
}

impl fmt::Display for TimeBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn truncated(now: DateTime<Utc>, unit_secs: i64) -> DateTime<Utc> {
    let next = (now.timestamp().div_euclid(unit_secs) + 1) * unit_secs;
    DateTime::from_timestamp(next, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn midnight(date: Option<NaiveDate>) -> DateTime<Utc> {
    date.and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = match now.month() {
        12 => (now.year() + 1, 1),
        month => (now.year(), month + 1),
    };
    midnight(NaiveDate::from_ymd_opt(year, month, 1))
}

fn next_day(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive().succ_opt())
}

fn next_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    truncated(now, 3600)
}

fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    truncated(now, 60)
}

fn next_second(now: DateTime<Utc>) -> DateTime<Utc> {
    truncated(now, 1)
}

/// Timer firing a callback at every boundary of one calendar unit
pub struct RotationTimer {
    boundaries: HandlerChain<BoundaryHandler>,
    delay: String,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RotationTimer {
    /// # Errors
    ///
    /// Returns `TimerConfig` when `delay` names no known boundary.
    pub fn new(delay: &str) -> Result<Self> {
        let boundary: TimeBoundary = delay.parse()?;
        Ok(Self::with_boundary(boundary))
    }

    #[must_use]
    pub fn with_boundary(boundary: TimeBoundary) -> Self {
        Self {
            boundaries: HandlerChain::builtin([
                ("MM", Arc::new(next_month) as Arc<BoundaryHandler>),
                ("dd", Arc::new(next_day) as Arc<BoundaryHandler>),
                ("HH", Arc::new(next_hour) as Arc<BoundaryHandler>),
                ("mm", Arc::new(next_minute) as Arc<BoundaryHandler>),
                ("ss", Arc::new(next_second) as Arc<BoundaryHandler>),
            ]),
            delay: boundary.token().to_string(),
            token: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn delay(&self) -> &str {
        &self.delay
    }

    /// Next firing time after `now`.
    ///
    /// # Errors
    ///
    /// Returns `TimerConfig` when the configured token has no handler.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let handler = self
            .boundaries
            .get(&self.delay)
            .ok_or_else(|| LoggerError::TimerConfig {
                token: self.delay.clone(),
            })?;
        Ok(handler(now))
    }

    /// Spawn the periodic task running `callback` at every boundary.
    ///
    /// # Errors
    ///
    /// Returns `TimerCallback` when the timer was already started or
    /// stopped.
    pub fn start<F, Fut>(&self, callback: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = self.task.lock();
        if task.is_some() || self.token.is_cancelled() {
            return Err(LoggerError::TimerCallback {
                message: "timer already has a callback".to_string(),
            });
        }

        let handler = self
            .boundaries
            .get(&self.delay)
            .cloned()
            .ok_or_else(|| LoggerError::TimerConfig {
                token: self.delay.clone(),
            })?;
        let token = self.token.clone();

        *task = Some(tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let wait = (handler(now) - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                callback().await;
            }
        }));
        Ok(())
    }

    /// Cancel the periodic task
    pub fn stop(&self) {
        self.token.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && self.task.lock().is_some()
    }
}

impl Drop for RotationTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl fmt::Debug for RotationTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationTimer")
            .field("delay", &self.delay)
            .field("running", &self.is_running())
            .finish()
    }
}
