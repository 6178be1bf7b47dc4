//! Progress/log events emitted by indexing, favicon caching, and site builds.
//!
//! Every run in this crate is a pull-based iterator of [`Event`]s: the caller
//! drives the pipeline by consuming events, and dropping the iterator is a
//! safe cancellation point (committed work stands, nothing rolls back).
//!
//! # Severity Contract
//!
//! | Level | Meaning |
//! |-------|---------|
//! | `Debug` | Per-step chatter, hidden unless verbose output is on |
//! | `Info` | Normal progress ("Indexed...", "Generating...") |
//! | `Warn` | Suspicious but recoverable |
//! | `Error` | The current file/item/artifact failed; the batch continues |
//! | `Critical` | The run cannot continue; the stream ends after this event |
//!
//! No failure path is silent — every skip or abort yields an event.

use std::fmt;

/// Event severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    /// Lowercase tag used in CLI output ("debug", "info", ...).
    pub fn tag(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One progress/log record: a severity plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: Level,
    pub message: String,
}

impl Event {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Event { level, message: message.into() }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Event::new(Level::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Event::new(Level::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Event::new(Level::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::new(Level::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Event::new(Level::Critical, message)
    }

    /// True for `Error` and `Critical` — the levels that make a CLI run
    /// exit non-zero.
    pub fn is_failure(&self) -> bool {
        self.level >= Level::Error
    }
}

/// Truncate `text` to at most `max` characters, appending `...` when cut.
///
/// Used to keep long URLs readable in event messages.
pub fn crop(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
