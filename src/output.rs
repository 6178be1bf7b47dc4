//! CLI presentation of run events.
//!
//! Every run (index, favicons, build) is an iterator of [`Event`]s; the CLI
//! drains it through a [`Reporter`], which decides what to show and keeps
//! the failure count that determines the exit code.
//!
//! # Output Format
//!
//! ```text
//! Indexing files...
//! Added item "20200101000000000" for "20200101000000000/index.html".
//! WARN: Failed to fetch "http://example.com/favicon.ico" for "...": HTTP 404
//! ERROR: File "missing.html" does not exist.
//! ```
//!
//! `Info` lines print bare; every other level carries an uppercase tag.
//! `Debug` lines are dropped unless verbose output is on. Failures (`Error`
//! and `Critical`) go to stderr, everything else to stdout.
//!
//! # Architecture
//!
//! [`format_event`] is pure and fully unit-tested; [`Reporter::report`] is
//! the thin I/O wrapper around [`Reporter::render`].

use crate::event::{Event, Level};

/// Render one event as a display line.
///
/// `Info` is the normal progress voice and prints without decoration; all
/// other levels are tagged so they stand out in a scrolling run.
pub fn format_event(event: &Event) -> String {
    match event.level {
        Level::Info => event.message.clone(),
        level => format!("{}: {}", level.tag().to_uppercase(), event.message),
    }
}

/// Drains run event streams for the CLI: filters debug chatter, routes
/// failures to stderr, and counts them for the exit code.
#[derive(Debug, Default)]
pub struct Reporter {
    verbose: bool,
    failures: usize,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Reporter { verbose, failures: 0 }
    }

    /// Account for `event` and return the line to display, if any.
    pub fn render(&mut self, event: &Event) -> Option<String> {
        if event.is_failure() {
            self.failures += 1;
        }
        if event.level == Level::Debug && !self.verbose {
            return None;
        }
        Some(format_event(event))
    }

    /// [`Reporter::render`] plus the actual printing.
    pub fn report(&mut self, event: &Event) {
        let failure = event.is_failure();
        if let Some(line) = self.render(event) {
            if failure {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
    }

    /// Number of `Error`/`Critical` events seen so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn had_failures(&self) -> bool {
        self.failures > 0
    }
}
