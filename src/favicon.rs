//! Content-addressed favicon cache.
//!
//! Items reference icons three ways: an absolute URL, a path inside the
//! item's own htz/maff archive, or a plain file relative to the item's
//! content. The cacher resolves whichever kinds its options allow to raw
//! bytes, validates the MIME type, stores the bytes once under
//! `tree/favicon/<sha256><ext>`, and rewrites the item's `icon` field to a
//! relative URL of the cache file. Identical bytes collapse to one cache
//! file no matter how many items reference them.
//!
//! Network access goes through the [`Fetcher`] capability so tests can
//! substitute a stub; the shipped [`HttpFetcher`] is a blocking client with
//! a 30-second timeout.
//!
//! Scheme-relative (`//host/...`) references and pure query/fragment
//! references are never cached — there is no safe way to resolve them.

use crate::archive;
use crate::book::{Book, BookError};
use crate::config::FaviconConfig;
use crate::event::{crop, Event};
use crate::urlpath;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// MIME types whose extension should not be left to the guessing library,
/// either because the library's pick is ambiguous or historically odd.
const COMMON_MIME_EXTENSIONS: [(&str, &str); 5] = [
    ("text/html", ".html"),
    ("application/xhtml+xml", ".xhtml"),
    ("image/svg+xml", ".svg"),
    ("image/jpeg", ".jpg"),
    ("application/octet-stream", ""),
];

/// File extension (with leading dot) for a MIME type; empty when unknown.
pub fn mime_to_extension(mime: &str) -> String {
    for (known, ext) in COMMON_MIME_EXTENSIONS {
        if known == mime {
            return ext.to_string();
        }
    }
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },
}

/// Bytes plus declared content type, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Pluggable `fetch(url) → (bytes, content-type)` capability.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Blocking HTTP fetcher used by the CLI.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("clipbook/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty());
        let bytes = response.bytes()?.to_vec();
        Ok(Fetched { bytes, mime })
    }
}

/// Cache favicons for `ids` (or every item when `None`).
///
/// Returns a pull-based run: consume it for events, then read the id →
/// cache-file mapping from [`CacheRun::cached`]. One id is processed per
/// refill, so dropping the run between events cancels cleanly.
pub fn cache_favicons<'a>(
    book: &'a mut Book,
    ids: Option<Vec<String>>,
    options: FaviconConfig,
    fetcher: &'a dyn Fetcher,
) -> CacheRun<'a> {
    let ids = ids.unwrap_or_else(|| book.meta.ids());
    let mut queue = VecDeque::new();
    queue.push_back(Event::info("Caching favicons..."));
    CacheRun {
        book,
        fetcher,
        options,
        pending: ids.into_iter(),
        queue,
        cached: HashMap::new(),
    }
}

pub struct CacheRun<'a> {
    book: &'a mut Book,
    fetcher: &'a dyn Fetcher,
    options: FaviconConfig,
    pending: std::vec::IntoIter<String>,
    queue: VecDeque<Event>,
    cached: HashMap<String, PathBuf>,
}

impl CacheRun<'_> {
    /// Items whose icon was (re)written to a cache file in this run.
    pub fn cached(&self) -> &HashMap<String, PathBuf> {
        &self.cached
    }
}

impl Iterator for CacheRun<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            let id = self.pending.next()?;
            let mut events = Vec::new();
            if let Some(path) =
                cache_one(self.book, &id, &self.options, self.fetcher, &mut events)
            {
                self.cached.insert(id, path);
            }
            self.queue.extend(events);
        }
    }
}

/// Resolve, validate, persist, and rewrite one item's icon.
///
/// Every failure pushes an `error` event and returns `None`; kinds the
/// options disallow (and unresolvable reference shapes) are silent skips.
pub(crate) fn cache_one(
    book: &mut Book,
    id: &str,
    options: &FaviconConfig,
    fetcher: &dyn Fetcher,
    events: &mut Vec<Event>,
) -> Option<PathBuf> {
    let (icon, index) = {
        let item = book.meta.get(id)?;
        (item.icon.clone()?, item.index.clone().unwrap_or_default())
    };
    if icon.is_empty() {
        return None;
    }

    // Directory the item's content lives in: icon references resolve from
    // here, and the rewritten icon URL is expressed relative to it.
    let content_dir = match Path::new(&index).parent() {
        Some(parent) if parent != Path::new("") => book.data_dir().join(parent),
        _ => book.data_dir(),
    };

    let fetched = if urlpath::has_scheme(&icon) {
        if !options.cache_url {
            return None;
        }
        events.push(Event::debug(format!(
            "Caching favicon \"{}\" for \"{id}\"...",
            crop(&icon, 256)
        )));
        match fetcher.fetch(&icon) {
            Ok(fetched) => fetched,
            Err(err) => {
                events.push(Event::error(format!(
                    "Failed to cache favicon \"{}\" for \"{id}\": {err}",
                    crop(&icon, 256)
                )));
                return None;
            }
        }
    } else if icon.starts_with("//") {
        // Scheme-relative: no scheme to resolve against.
        return None;
    } else {
        let reference = urlpath::split_reference(&icon);
        if reference.path.is_empty() {
            // Pure query/fragment reference.
            return None;
        }
        let subpath = urlpath::percent_decode(reference.path);
        let index_path = Path::new(&index);
        if archive::is_archive(index_path) {
            if !options.cache_archive {
                return None;
            }
            events.push(Event::debug(format!(
                "Caching favicon \"{}\" for \"{id}\"...",
                crop(&icon, 256)
            )));
            match read_archive_icon(&book.data_dir().join(&index), &subpath) {
                Ok(fetched) => fetched,
                Err(err) => {
                    events.push(Event::error(format!(
                        "Failed to cache favicon \"{}\" for \"{id}\": {err}",
                        crop(&icon, 256)
                    )));
                    return None;
                }
            }
        } else {
            if !options.cache_file {
                return None;
            }
            let resolved = urlpath::normalize(&content_dir.join(&subpath));
            if resolved.starts_with(book.favicon_dir()) {
                // Already a cache file; re-caching would churn forever.
                return None;
            }
            events.push(Event::debug(format!(
                "Caching favicon \"{}\" for \"{id}\"...",
                crop(&icon, 256)
            )));
            match fs::read(&resolved) {
                Ok(bytes) => {
                    let mime = mime_guess::from_path(&resolved)
                        .first_raw()
                        .map(str::to_string);
                    Fetched { bytes, mime }
                }
                Err(err) => {
                    events.push(Event::error(format!(
                        "Failed to cache favicon \"{}\" for \"{id}\": unable to read {:?}: {err}",
                        crop(&icon, 256),
                        book.subpath(&resolved),
                    )));
                    return None;
                }
            }
        }
    };

    let Some(mime) = fetched.mime else {
        events.push(Event::error(format!(
            "Failed to cache favicon \"{}\" for \"{id}\": unknown MIME type",
            crop(&icon, 256)
        )));
        return None;
    };
    if !(mime.starts_with("image/") || mime == "application/octet-stream") {
        events.push(Event::error(format!(
            "Failed to cache favicon \"{}\" for \"{id}\": unsupported MIME type \"{mime}\"",
            crop(&icon, 256)
        )));
        return None;
    }

    let hash = format!("{:x}", Sha256::digest(&fetched.bytes));
    let cache_file = book
        .favicon_dir()
        .join(format!("{hash}{}", mime_to_extension(&mime)));

    if cache_file.is_file() {
        events.push(Event::debug(format!(
            "Reusing cached favicon \"{}\" for \"{id}\".",
            book.subpath(&cache_file)
        )));
    } else if let Err(err) = write_cache_file(book, &cache_file, &fetched.bytes) {
        events.push(Event::error(format!(
            "Failed to cache favicon \"{}\" for \"{id}\": {err}",
            crop(&icon, 256)
        )));
        return None;
    } else {
        events.push(Event::info(format!(
            "Saved favicon \"{}\" for \"{id}\".",
            book.subpath(&cache_file)
        )));
    }

    let Some(rel) = urlpath::relative_url(&cache_file, &content_dir, false) else {
        events.push(Event::error(format!(
            "Failed to cache favicon \"{}\" for \"{id}\": cannot relativize cache path",
            crop(&icon, 256)
        )));
        return None;
    };
    if let Some(item) = book.meta.get_mut(id) {
        item.icon = Some(rel);
    }
    Some(cache_file)
}

fn read_archive_icon(archive_path: &Path, subpath: &str) -> Result<Fetched, archive::ArchiveError> {
    let index_member = archive::index_member(archive_path)?;
    let member = archive::sibling_member(&index_member, subpath);
    let bytes = archive::read_member(archive_path, &member)?;
    let mime = mime_guess::from_path(Path::new(&member)).first_raw().map(str::to_string);
    Ok(Fetched { bytes, mime })
}

fn write_cache_file(book: &mut Book, cache_file: &Path, bytes: &[u8]) -> Result<(), BookError> {
    if let Some(parent) = cache_file.parent() {
        fs::create_dir_all(parent)?;
    }
    book.backup(cache_file)?;
    fs::write(cache_file, bytes)?;
    Ok(())
}
