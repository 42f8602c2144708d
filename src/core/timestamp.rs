//! Timestamp formatting utilities
//!
//! Record timestamps are ISO 8601 with milliseconds in UTC. File names use a
//! small date template language:
//!
//! | token  | meaning                 |
//! |--------|-------------------------|
//! | `yyyy` | four digit year         |
//! | `yy`   | two digit year          |
//! | `MM`   | month, `01`-`12`        |
//! | `dd`   | day of month            |
//! | `hh`   | hour, 24h clock         |
//! | `mm`   | minute                  |
//! | `ss`   | second                  |
//! | `SSS`  | millisecond             |
//!
//! Any other character is copied verbatim.

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template used for file names when none is configured
pub const DEFAULT_DATE_TEMPLATE: &str = "yyyy-MM-dd-hh";

/// `2025-01-08T10:30:45.123Z`
#[must_use]
pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Year,
    ShortYear,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
}

const TOKENS: [(&str, Part); 8] = [
    ("yyyy", Part::Year),
    ("yy", Part::ShortYear),
    ("MM", Part::Month),
    ("dd", Part::Day),
    ("hh", Part::Hour),
    ("mm", Part::Minute),
    ("ss", Part::Second),
    ("SSS", Part::Millis),
];

/// Parsed date template
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DateTemplate {
    source: String,
    parts: Vec<Part>,
}

impl DateTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let source = template.into();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = source.as_str();

        'scan: while !rest.is_empty() {
            for (token, part) in &TOKENS {
                if let Some(tail) = rest.strip_prefix(token) {
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part.clone());
                    rest = tail;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Self { source, parts }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn render(&self, time: &DateTime<Utc>) -> String {
        let mut out = String::with_capacity(self.source.len() + 8);
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Year => out.push_str(&format!("{:04}", time.year())),
                Part::ShortYear => out.push_str(&format!("{:02}", time.year().rem_euclid(100))),
                Part::Month => out.push_str(&format!("{:02}", time.month())),
                Part::Day => out.push_str(&format!("{:02}", time.day())),
                Part::Hour => out.push_str(&format!("{:02}", time.hour())),
                Part::Minute => out.push_str(&format!("{:02}", time.minute())),
                Part::Second => out.push_str(&format!("{:02}", time.second())),
                Part::Millis => out.push_str(&format!("{:03}", time.timestamp_subsec_millis() % 1000)),
            }
        }
        out
    }
}

impl Default for DateTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_TEMPLATE)
    }
}

impl From<String> for DateTemplate {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

impl From<&str> for DateTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<DateTemplate> for String {
    fn from(template: DateTemplate) -> Self {
        template.source
    }
}

impl fmt::Debug for DateTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateTemplate").field(&self.source).finish()
    }
}
