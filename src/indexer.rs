//! Item metadata derivation for captured files.
//!
//! The indexer turns loose files in the data directory into registered
//! items: it classifies each file, recovers provenance left behind by the
//! capturing tool, honors explicit `data-clipbook-*` overrides baked into
//! the markup, resolves a unique timestamp id, and fills every descriptor
//! field a well-formed item carries.
//!
//! # Field Inference
//!
//! Each field falls back through a fixed chain until something sticks:
//!
//! | Field | Chain |
//! |-------|-------|
//! | `type` | explicit → "" for web documents, `file` otherwise |
//! | `title` | explicit → extractor → `<title>` element → source URL basename → "" |
//! | `create` | explicit → extractor → the id itself (canonical) → file ctime → explicit modify → "" |
//! | `modify` | explicit → file mtime → `create` → "" |
//! | `icon` | explicit → first `<link rel~=icon>` href → "" |
//! | `source`, `comment` | explicit → extractor (source) → "" |
//!
//! `<title>` elements nested under `xmp`, `svg`, or `template` are ignored;
//! those hold embedded or inert content, not the page title.
//!
//! # Id Resolution
//!
//! An explicit `data-clipbook-id` is used verbatim, or the whole file is
//! rejected when the id is reserved or taken. Otherwise the file name (for
//! `index.html`, the parent directory name) becomes the id when it is a
//! well-formed timestamp id and free; anything else gets a fresh id from
//! the current time, stepped forward one millisecond at a time until
//! unused. Items register as soon as their id resolves, so later files in
//! the same batch collide against them.
//!
//! Failures are per-file: an error event skips the file and the batch
//! moves on.

use crate::book::{self, Book, Item, ItemType};
use crate::classify;
use crate::config::FaviconConfig;
use crate::event::Event;
use crate::favicon::{self, Fetcher};
use crate::provenance::{self, ExtractorOptions};
use crate::timestamp;
use crate::urlpath;
use chrono::Utc;
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("link").unwrap());

/// Ancestor elements whose `<title>` children are not the page title.
const TITLE_EXCLUDE_PARENTS: [&str; 3] = ["xmp", "svg", "template"];

/// Indexing switches. Extractors can be disabled individually; `cache_url`
/// controls whether the embedded favicon pass may touch the network.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub extractors: ExtractorOptions,
    pub cache_url: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { extractors: ExtractorOptions::default(), cache_url: true }
    }
}

/// Index `files` into the book's metadata store.
///
/// Returns a pull-based run: consume it for events, then read the newly
/// registered ids from [`IndexRun::indexed`]. One file is processed per
/// refill, so dropping the run between events cancels cleanly.
pub fn index_files<'a>(
    book: &'a mut Book,
    files: Vec<PathBuf>,
    options: IndexOptions,
    fetcher: &'a dyn Fetcher,
) -> IndexRun<'a> {
    let mut queue = VecDeque::new();
    queue.push_back(Event::info("Indexing files..."));
    IndexRun {
        book,
        fetcher,
        options,
        pending: files.into_iter(),
        queue,
        indexed: Vec::new(),
    }
}

pub struct IndexRun<'a> {
    book: &'a mut Book,
    fetcher: &'a dyn Fetcher,
    options: IndexOptions,
    pending: std::vec::IntoIter<PathBuf>,
    queue: VecDeque<Event>,
    indexed: Vec<String>,
}

impl IndexRun<'_> {
    /// Ids registered by this run, in processing order.
    pub fn indexed(&self) -> &[String] {
        &self.indexed
    }
}

impl Iterator for IndexRun<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            let file = self.pending.next()?;
            let mut events = Vec::new();
            if let Some(id) =
                index_one(self.book, &file, &self.options, self.fetcher, &mut events)
            {
                self.indexed.push(id);
            }
            self.queue.extend(events);
        }
    }
}

/// Index a single file. Every failure pushes an `error` event and returns
/// `None`; success pushes an "Added item" event and returns the new id.
fn index_one(
    book: &mut Book,
    file: &Path,
    options: &IndexOptions,
    fetcher: &dyn Fetcher,
    events: &mut Vec<Event>,
) -> Option<String> {
    let subpath = book.subpath(file);
    events.push(Event::debug(format!("Indexing \"{subpath}\"...")));

    if !file.is_file() {
        events.push(Event::error(format!("File \"{subpath}\" does not exist.")));
        return None;
    }
    // Canonicalize so the data-dir prefix check holds for relative and
    // symlinked arguments alike (the book root is canonical already).
    let file = match fs::canonicalize(file) {
        Ok(path) => path,
        Err(err) => {
            events.push(Event::error(format!("Failed to access \"{subpath}\": {err}")));
            return None;
        }
    };
    let subpath = book.subpath(&file);
    let Ok(rel) = file.strip_prefix(book.data_dir()) else {
        events.push(Event::error(format!(
            "File \"{subpath}\" is not under the data directory."
        )));
        return None;
    };
    let index = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let is_web_document = classify::is_web_document(&file);
    let document = if is_web_document {
        match classify::load_document(&file) {
            Ok(doc) => Some(doc),
            Err(err) => {
                events.push(Event::error(format!(
                    "Failed to read document from file \"{subpath}\": {err}"
                )));
                return None;
            }
        }
    } else {
        None
    };

    // Provenance first, explicit attributes second: a value the capturing
    // tool stamped loses to one the user wrote into the root element.
    let mut item = Item::default();
    let mut explicit_id = None;
    if let Some(doc) = &document {
        let found = provenance::extract(doc, &options.extractors);
        item.source = found.source;
        item.create = found.create;
        item.title = found.title;
        apply_root_attributes(doc, &mut item, &mut explicit_id);
    }

    let id = match explicit_id {
        Some(id) => {
            if book.meta.contains(&id) {
                events.push(Event::error(format!("Specified ID \"{id}\" is already used.")));
                return None;
            }
            if book::is_reserved_id(&id) {
                events.push(Event::error(format!("Specified ID \"{id}\" is invalid.")));
                return None;
            }
            id
        }
        None => match filename_id(rel) {
            Some(candidate) if !book.meta.contains(&candidate) => candidate,
            _ => synthesize_id(book),
        },
    };

    item.index = Some(index.clone());

    if item.type_str().is_empty() {
        item.item_type = Some(if is_web_document { ItemType::Page } else { ItemType::File });
    }

    if item.title.is_none() {
        let mut title = document.as_ref().and_then(document_title);
        if title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            title = item.source.as_deref().and_then(title_from_source);
        }
        item.title = Some(title.unwrap_or_default());
    }

    let file_meta = fs::metadata(&file).ok();
    if item.create.as_deref().map_or(true, str::is_empty) {
        let fallback_modify = item.modify.clone().filter(|m| !m.is_empty());
        item.create = Some(
            infer_create(&id, file_meta.as_ref(), fallback_modify).unwrap_or_default(),
        );
    }
    if item.modify.as_deref().map_or(true, str::is_empty) {
        let mtime = file_meta.as_ref().and_then(|m| m.modified().ok());
        item.modify = Some(
            mtime
                .map(timestamp::system_time_to_id)
                .or_else(|| item.create.clone().filter(|c| !c.is_empty()))
                .unwrap_or_default(),
        );
    }

    if item.icon.is_none() {
        let icon = document.as_ref().and_then(document_icon);
        item.icon = Some(icon.unwrap_or_default());
    }

    book.meta.insert(id.clone(), item);

    // Icons referenced inside the freshly indexed archive would dangle once
    // the file moves, so archive extraction is always on for this pass.
    let favicon_options = FaviconConfig {
        cache_url: options.cache_url,
        cache_archive: true,
        cache_file: false,
    };
    favicon::cache_one(book, &id, &favicon_options, fetcher, events);

    if let Some(item) = book.meta.get_mut(&id) {
        if item.source.is_none() {
            item.source = Some(String::new());
        }
        if item.comment.is_none() {
            item.comment = Some(String::new());
        }
    }

    events.push(Event::info(format!("Added item \"{id}\" for \"{subpath}\".")));
    Some(id)
}

/// Merge `data-clipbook-*` attributes of the root element into the draft
/// item. Known keys land in their typed fields; anything else rides along
/// in `extra`.
fn apply_root_attributes(doc: &Html, item: &mut Item, explicit_id: &mut Option<String>) {
    for (name, value) in doc.root_element().value().attrs() {
        let Some(key) = name.strip_prefix("data-clipbook-") else {
            continue;
        };
        match key {
            "id" if !value.is_empty() => *explicit_id = Some(value.to_string()),
            "id" => {}
            "type" => item.item_type = Some(ItemType::from(value)),
            "title" => item.title = Some(value.to_string()),
            "source" => item.source = Some(value.to_string()),
            "icon" => item.icon = Some(value.to_string()),
            "comment" => item.comment = Some(value.to_string()),
            "create" => item.create = Some(value.to_string()),
            "modify" => item.modify = Some(value.to_string()),
            "marked" => item.marked = value == "true",
            other => {
                item.extra
                    .insert(other.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }
}

/// Candidate id from the file name: the stem, or the parent directory name
/// for an `index.html`, when that is a well-formed timestamp id.
fn filename_id(rel: &Path) -> Option<String> {
    let name = if rel.file_name()?.to_string_lossy() == "index.html" {
        rel.parent()?.file_name()?.to_string_lossy()
    } else {
        rel.file_stem()?.to_string_lossy()
    };
    timestamp::is_id(&name).then(|| name.into_owned())
}

/// Fresh id from the current instant, stepped by one millisecond until it
/// does not collide with a registered item.
fn synthesize_id(book: &Book) -> String {
    let mut dt = Utc::now();
    let mut id = timestamp::datetime_to_id(&dt);
    while book.meta.contains(&id) {
        dt = timestamp::step(&dt);
        id = timestamp::datetime_to_id(&dt);
    }
    id
}

/// Text of the first `<title>` element not nested under an excluded parent.
fn document_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE)
        .find(|el| {
            !el.ancestors().any(|node| match node.value() {
                scraper::node::Node::Element(parent) => {
                    TITLE_EXCLUDE_PARENTS.contains(&parent.name())
                }
                _ => false,
            })
        })
        .map(|el| el.text().collect())
}

/// Last path segment of the source URL, percent-decoded.
fn title_from_source(source: &str) -> Option<String> {
    let url = Url::parse(source).ok()?;
    let path = urlpath::percent_decode(url.path());
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => None,
    }
}

/// `href` of the first `<link>` whose space-separated `rel` contains `icon`
/// (matches `icon`, `shortcut icon`, `ICON`, ...).
fn document_icon(doc: &Html) -> Option<String> {
    doc.select(&LINK)
        .find(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_ascii_lowercase().split_whitespace().any(|r| r == "icon"))
        })
        .map(|el| el.value().attr("href").unwrap_or("").to_string())
}

fn infer_create(
    id: &str,
    file_meta: Option<&fs::Metadata>,
    fallback_modify: Option<String>,
) -> Option<String> {
    if timestamp::is_id(id) {
        return Some(id.to_string());
    }
    if let Some(created) = file_meta.and_then(|m| m.created().ok()) {
        return Some(timestamp::system_time_to_id(created));
    }
    fallback_modify
}
