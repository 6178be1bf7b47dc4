//! Shared test utilities for the clipbook test suite.
//!
//! Zip fixtures for archive-backed items, plus a canned [`Fetcher`] so
//! favicon caching never touches the network in tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! write_zip(&path, &[("index.html", b"<html/>"), ("favicon.ico", b"\x00")]);
//!
//! let fetcher = StubFetcher::new()
//!     .with("http://example.com/favicon.png", b"png-bytes", Some("image/png"));
//! ```

use crate::favicon::{FetchError, Fetched, Fetcher};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// =========================================================================
// Zip fixtures
// =========================================================================

/// Write a zip file with the given members, in declaration order.
///
/// Member order matters for maff fixtures: the primary page is the first
/// matching index member in declared order.
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

// =========================================================================
// Canned network
// =========================================================================

/// In-memory [`Fetcher`]: serves registered URLs and 404s everything else.
pub struct StubFetcher {
    responses: HashMap<String, Fetched>,
}

impl StubFetcher {
    pub fn new() -> Self {
        StubFetcher { responses: HashMap::new() }
    }

    /// Register a canned response for `url`.
    pub fn with(mut self, url: &str, bytes: &[u8], mime: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            Fetched { bytes: bytes.to_vec(), mime: mime.map(str::to_string) },
        );
        self
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}
