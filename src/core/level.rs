//! Severity level table (syslog ordering, 0 is most severe)

use super::error::LoggerError;
use colored::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Level {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

/// ANSI sequence restoring the terminal's default color
pub const COLOR_RESET: &str = "\u{1b}[0m";

impl Level {
    /// Every level, most severe first
    pub const ALL: [Level; 8] = [
        Level::Emergency,
        Level::Alert,
        Level::Critical,
        Level::Error,
        Level::Warning,
        Level::Notice,
        Level::Info,
        Level::Debug,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Level::Emergency => "emerg",
            Level::Alert => "alert",
            Level::Critical => "crit",
            Level::Error => "error",
            Level::Warning => "warn",
            Level::Notice => "note",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    #[inline]
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Level::Emergency),
            1 => Some(Level::Alert),
            2 => Some(Level::Critical),
            3 => Some(Level::Error),
            4 => Some(Level::Warning),
            5 => Some(Level::Notice),
            6 => Some(Level::Info),
            7 => Some(Level::Debug),
            _ => None,
        }
    }

    /// Look a level up by its table name
    pub fn from_name(name: &str) -> Option<Self> {
        Level::ALL.into_iter().find(|level| level.name() == name)
    }

    /// Display color, `None` meaning the terminal default
    pub fn color(&self) -> Option<Color> {
        match self {
            Level::Emergency => Some(Color::BrightYellow),
            Level::Alert => Some(Color::Yellow),
            Level::Critical => Some(Color::BrightRed),
            Level::Error | Level::Warning => Some(Color::Red),
            Level::Notice => Some(Color::Magenta),
            Level::Info => None,
            Level::Debug => Some(Color::Blue),
        }
    }

    /// ANSI escape sequence selecting this level's color
    pub const fn ansi(&self) -> &'static str {
        match self {
            Level::Emergency => "\u{1b}[33;1m",
            Level::Alert => "\u{1b}[33m",
            Level::Critical => "\u{1b}[31;1m",
            Level::Error | Level::Warning => "\u{1b}[31m",
            Level::Notice => "\u{1b}[35m",
            Level::Info => COLOR_RESET,
            Level::Debug => "\u{1b}[34m",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_name(&s.to_lowercase()).ok_or_else(|| LoggerError::invalid_level(s))
    }
}

impl TryFrom<String> for Level {
    type Error = LoggerError;

    fn try_from(value: String) -> Result<Self, LoggerError> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.name().to_string()
    }
}
